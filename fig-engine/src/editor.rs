use std::collections::HashSet;
use std::mem;

use fig_core::entity::{
    ArcKind, ArrowEnd, Compound, Entity, EntityId, LineKind, ObjectKind, Variant,
};
use fig_core::geometry::{Bounds, Point};
use fig_core::picture::PictureCache;
use fig_core::store::ObjectStore;
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::hooks::{EditorHooks, NoHooks};
use crate::operation::{ActionKind, Operation};
use crate::reshape;
use crate::undo::{
    ArrowChange, PointChange, UndoOutcome, UndoRecord, attach_arrow, detach_arrow, exchange,
    insert_point, remove_point,
};

#[derive(Debug, Clone, Copy)]
pub struct EditorOptions {
    /// 每次修改后从根重新统计深度并与深度表比对。
    pub verify_depths: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            verify_depths: true,
        }
    }
}

/// 编辑会话：当前文档、选中集与单槽撤销记录。
#[derive(Debug)]
pub struct Editor<H: EditorHooks = NoHooks> {
    store: ObjectStore,
    undo: Option<UndoRecord>,
    selected: HashSet<EntityId>,
    figure_name: String,
    latest: Vec<EntityId>,
    hooks: H,
    options: EditorOptions,
}

impl Editor {
    pub fn new() -> Self {
        Self::with_hooks(NoHooks)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

fn scale_factors(fix: Point, from: Point, to: Point) -> Result<(f64, f64), EngineError> {
    let span = fix.offset_to(from);
    let target = fix.offset_to(to);
    if span.x == 0 || span.y == 0 || target.x == 0 || target.y == 0 {
        return Err(EngineError::rejected(
            "scaling needs a reference point off both axes of the fixed point",
        ));
    }
    Ok((
        f64::from(target.x) / f64::from(span.x),
        f64::from(target.y) / f64::from(span.y),
    ))
}

impl<H: EditorHooks> Editor<H> {
    pub fn with_hooks(hooks: H) -> Self {
        Self {
            store: ObjectStore::new(),
            undo: None,
            selected: HashSet::new(),
            figure_name: String::new(),
            latest: Vec::new(),
            hooks,
            options: EditorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EditorOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    #[inline]
    pub fn figure_name(&self) -> &str {
        &self.figure_name
    }

    pub fn last_action(&self) -> ActionKind {
        self.undo
            .as_ref()
            .map_or(ActionKind::None, UndoRecord::action)
    }

    #[inline]
    pub fn undo_record(&self) -> Option<&UndoRecord> {
        self.undo.as_ref()
    }

    /// 最近一次操作或撤销后新出现在文档中的图元（组合体、转换结果、拆分段等）。
    #[inline]
    pub fn latest(&self) -> &[EntityId] {
        &self.latest
    }

    #[inline]
    pub fn pictures_mut(&mut self) -> &mut PictureCache {
        self.store.pictures_mut()
    }

    /// 创建游离图元，之后通过 [`Operation::Add`] 加入文档。
    pub fn create(&mut self, entity: impl Into<Entity>) -> Result<EntityId, EngineError> {
        Ok(self.store.insert(entity)?)
    }

    /// 深拷贝任意图元，副本处于游离状态。
    pub fn clone_entity(&mut self, id: EntityId) -> Result<EntityId, EngineError> {
        Ok(self.store.clone_entity(id)?)
    }

    /// 在文档之外组装组合体。
    pub fn nest(&mut self, compound: EntityId, id: EntityId) -> Result<(), EngineError> {
        self.ensure_scratch(compound)?;
        self.ensure_scratch(id)?;
        Ok(self.store.list_add(compound, id)?)
    }

    /// 修改尚未加入文档的图元。
    pub fn modify_detached<T: Variant, R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, EngineError> {
        self.ensure_scratch(id)?;
        Ok(self.store.modify(id, f)?)
    }

    /// 丢弃尚未加入文档的游离图元。
    pub fn discard(&mut self, id: EntityId) -> Result<(), EngineError> {
        self.ensure_scratch(id)?;
        Ok(self.store.free(id)?)
    }

    fn ensure_scratch(&self, id: EntityId) -> Result<(), EngineError> {
        self.store.get(id)?;
        if self.store.is_attached(id) {
            return Err(EngineError::rejected(format!(
                "{id} belongs to the figure; change it through an operation"
            )));
        }
        if self.kept_by_undo(id) {
            return Err(EngineError::rejected(format!("{id} is kept by the undo record")));
        }
        Ok(())
    }

    fn kept_by_undo(&self, id: EntityId) -> bool {
        let Some(record) = &self.undo else {
            return false;
        };
        let mut current = Some(id);
        while let Some(entity) = current {
            if record.holds(entity) {
                return true;
            }
            current = self.store.parent(entity);
        }
        false
    }

    fn ensure_top_level(&self, id: EntityId) -> Result<(), EngineError> {
        self.store.get(id)?;
        if self.store.parent(id) != Some(self.store.root()) {
            return Err(EngineError::NotInDocument(id.get()));
        }
        Ok(())
    }

    fn ensure_distinct(ids: &[EntityId]) -> Result<(), EngineError> {
        if ids.is_empty() {
            return Err(EngineError::EmptyOperation);
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) {
                return Err(EngineError::rejected(format!("{id} is named twice")));
            }
        }
        Ok(())
    }

    fn ensure_all_top_level(&self, ids: &[EntityId]) -> Result<(), EngineError> {
        Self::ensure_distinct(ids)?;
        ids.iter().try_for_each(|id| self.ensure_top_level(*id))
    }

    // ---- 选中集 ----

    #[inline]
    pub fn selection_len(&self) -> usize {
        self.selected.len()
    }

    #[inline]
    pub fn is_selected(&self, id: EntityId) -> bool {
        self.selected.contains(&id)
    }

    /// 只能选中文档的顶层图元。
    pub fn select(&mut self, id: EntityId) -> Result<(), EngineError> {
        self.ensure_top_level(id)?;
        self.selected.insert(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: EntityId) -> bool {
        self.selected.remove(&id)
    }

    /// 切换选中状态，返回切换后的状态。
    pub fn toggle_selection(&mut self, id: EntityId) -> Result<bool, EngineError> {
        self.ensure_top_level(id)?;
        if self.selected.insert(id) {
            Ok(true)
        } else {
            self.selected.remove(&id);
            Ok(false)
        }
    }

    #[inline]
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// 按 ID 升序返回选中的图元。
    pub fn selection(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.selected.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 把选中的图元组合为一个新组合体并选中它。
    pub fn glue_selection(&mut self) -> Result<EntityId, EngineError> {
        let entities = self.selection();
        self.apply(Operation::Glue { entities })?;
        let compound = self.latest.first().copied().ok_or_else(|| {
            EngineError::rejected("glue produced no compound")
        })?;
        self.selected.insert(compound);
        Ok(compound)
    }

    // ---- 通知 ----

    fn region(&self, ids: &[EntityId]) -> Option<Bounds> {
        ids.iter().fold(None, |acc, id| {
            Bounds::union(acc, self.hooks.entity_bounds(&self.store, *id))
        })
    }

    fn mark_dirty(&mut self, region: Option<Bounds>) {
        if let Some(region) = region {
            self.hooks.region_dirty(region);
        }
    }

    fn after_change(&mut self) -> Result<(), EngineError> {
        if let Some(range) = self.store.take_depth_range_change() {
            debug!(range = ?range, "深度范围已变化");
            self.hooks.depth_range_changed(range);
        }
        if self.options.verify_depths {
            self.store.verify_depths()?;
        }
        Ok(())
    }

    // ---- 操作 ----

    /// 释放撤销记录保管的图元并清空槽位。
    pub fn clean_up(&mut self) -> Result<(), EngineError> {
        if let Some(record) = self.undo.take() {
            debug!(action = %record.action(), "释放撤销记录");
            record.release(&mut self.store)?;
        }
        Ok(())
    }

    /// 执行一个结构性修改并把它记入撤销槽位。
    ///
    /// 前置条件不满足时返回错误，文档与撤销槽位都保持原样。
    pub fn apply(&mut self, operation: Operation) -> Result<(), EngineError> {
        let action = operation.action();
        for id in operation.operands() {
            if self.kept_by_undo(id) {
                return Err(EngineError::rejected(format!(
                    "{id} is kept by the undo record"
                )));
            }
        }
        let record = match operation {
            Operation::Add { entities } => self.apply_add(entities)?,
            Operation::Delete { entities } => self.apply_delete(entities)?,
            Operation::Move { entities, from, to } => self.apply_move(entities, from, to)?,
            Operation::Scale {
                target,
                fix,
                from,
                to,
            } => self.apply_scale(target, fix, from, to)?,
            Operation::Edit {
                target,
                replacement,
            } => {
                self.ensure_top_level(target)?;
                if replacement == target || !self.store.is_detached(replacement) {
                    return Err(EngineError::rejected(format!(
                        "{replacement} must be a detached entity"
                    )));
                }
                self.commit_exchange(ActionKind::Edit, vec![target], vec![replacement])?
            }
            Operation::Glue { entities } => self.apply_glue(entities)?,
            Operation::Break { compound } => self.apply_break(compound)?,
            Operation::Load { figure, name } => self.apply_load(figure, name)?,
            Operation::AddPoint {
                target,
                index,
                point,
                sfactor,
            } => self.apply_add_point(target, index, point, sfactor)?,
            Operation::DeletePoint { target, index } => self.apply_delete_point(target, index)?,
            Operation::AddArrowHead { target, end, arrow } => {
                self.ensure_arrow_slot(target, end, false)?;
                self.clean_up()?;
                let change = ArrowChange { target, end, arrow };
                attach_arrow(&mut self.store, &change)?;
                let region = self.region(&[target]);
                self.mark_dirty(region);
                UndoRecord::AddArrowHead(change)
            }
            Operation::DeleteArrowHead { target, end } => {
                self.ensure_arrow_slot(target, end, true)?;
                let before = self.region(&[target]);
                self.clean_up()?;
                let change = detach_arrow(&mut self.store, target, end)?;
                self.mark_dirty(before);
                UndoRecord::DeleteArrowHead(change)
            }
            Operation::Convert { target } => {
                self.ensure_top_level(target)?;
                let converted = reshape::converted(self.store.get(target)?)?;
                let live = self.prepare(vec![converted])?;
                self.commit_prepared(ActionKind::Convert, vec![target], live)?
            }
            Operation::OpenClose { target } => {
                self.ensure_top_level(target)?;
                let toggled = reshape::toggled_closure(self.store.get(target)?)?;
                let live = self.prepare(vec![toggled])?;
                self.commit_prepared(ActionKind::OpenClose, vec![target], live)?
            }
            Operation::Join { first, second } => {
                self.ensure_all_top_level(&[first, second])?;
                let joined = reshape::joined(self.store.get(first)?, self.store.get(second)?)?;
                let live = self.prepare(vec![joined])?;
                self.commit_prepared(ActionKind::JoinSplit, vec![first, second], live)?
            }
            Operation::Split { target, index } => {
                self.ensure_top_level(target)?;
                let (head, tail) = reshape::split(self.store.get(target)?, index)?;
                let live = self.prepare(vec![head, tail])?;
                self.commit_prepared(ActionKind::JoinSplit, vec![target], live)?
            }
        };
        debug!(action = %action, "已执行操作");
        self.undo = Some(record);
        self.after_change()
    }

    fn apply_add(&mut self, entities: Vec<EntityId>) -> Result<UndoRecord, EngineError> {
        Self::ensure_distinct(&entities)?;
        for id in &entities {
            self.store.get(*id)?;
            if !self.store.is_detached(*id) {
                return Err(EngineError::rejected(format!("{id} is already linked")));
            }
        }
        self.clean_up()?;
        let root = self.store.root();
        self.store.with_bulk_depths(|store| {
            entities.iter().try_for_each(|id| store.list_add(root, *id))
        })?;
        let region = self.region(&entities);
        self.mark_dirty(region);
        self.latest = entities.clone();
        Ok(UndoRecord::Add { entities })
    }

    fn apply_delete(&mut self, entities: Vec<EntityId>) -> Result<UndoRecord, EngineError> {
        self.ensure_all_top_level(&entities)?;
        let region = self.region(&entities);
        self.clean_up()?;
        self.unlink(&entities)?;
        self.mark_dirty(region);
        self.latest.clear();
        Ok(UndoRecord::Delete { entities })
    }

    fn apply_move(
        &mut self,
        entities: Vec<EntityId>,
        from: Point,
        to: Point,
    ) -> Result<UndoRecord, EngineError> {
        self.ensure_all_top_level(&entities)?;
        self.clean_up()?;
        let delta = from.offset_to(to);
        self.translate(&entities, delta.x, delta.y)?;
        self.latest.clear();
        Ok(UndoRecord::Move { entities, from, to })
    }

    fn apply_scale(
        &mut self,
        target: EntityId,
        fix: Point,
        from: Point,
        to: Point,
    ) -> Result<UndoRecord, EngineError> {
        self.ensure_top_level(target)?;
        let (sx, sy) = scale_factors(fix, from, to)?;
        self.clean_up()?;
        self.scale(target, fix, sx, sy)?;
        self.latest.clear();
        Ok(UndoRecord::Scale {
            target,
            fix,
            from,
            to,
        })
    }

    fn apply_glue(&mut self, entities: Vec<EntityId>) -> Result<UndoRecord, EngineError> {
        self.ensure_all_top_level(&entities)?;
        let mut shell = Compound::new();
        if let Some(bounds) = self.region(&entities) {
            shell.set_bounds(bounds);
        }
        let compound = self.store.insert(shell)?;
        let result = self.clean_up().and_then(|()| {
            let root = self.store.root();
            Ok(self.store.glue(root, compound, &entities)?)
        });
        if let Err(err) = result {
            self.release_prepared(&[compound]);
            return Err(err);
        }
        for id in &entities {
            self.selected.remove(id);
        }
        self.latest = vec![compound];
        Ok(UndoRecord::Glue { compound })
    }

    fn apply_break(&mut self, compound: EntityId) -> Result<UndoRecord, EngineError> {
        self.ensure_top_level(compound)?;
        if self.store.kind_of(compound)? != ObjectKind::Compound {
            return Err(EngineError::rejected(format!("{compound} is not a compound")));
        }
        self.clean_up()?;
        let root = self.store.root();
        self.latest = self.store.break_apart(root, compound)?;
        self.selected.remove(&compound);
        Ok(UndoRecord::Break { compound })
    }

    fn apply_load(&mut self, figure: EntityId, name: String) -> Result<UndoRecord, EngineError> {
        self.store.get_as::<Compound>(figure)?;
        if !self.store.is_detached(figure) {
            return Err(EngineError::rejected(format!(
                "{figure} must be a detached compound"
            )));
        }
        self.clean_up()?;
        let saved_root = self.store.swap_root(figure)?;
        let saved_name = mem::replace(&mut self.figure_name, name);
        self.selected.clear();
        self.latest.clear();
        let region = Bounds::union(self.region(&[saved_root]), self.region(&[figure]));
        self.mark_dirty(region);
        info!(figure = %figure, name = %self.figure_name, "已载入图形");
        Ok(UndoRecord::Load {
            saved_root,
            saved_name,
        })
    }

    /// 当前点数与该形状允许的最少点数。
    fn point_chain(&self, target: EntityId) -> Result<(usize, usize), EngineError> {
        self.ensure_top_level(target)?;
        match self.store.get(target)? {
            Entity::Line(line) => match line.kind {
                LineKind::Polyline => Ok((line.vertex_count(), 2)),
                LineKind::Polygon => Ok((line.vertex_count(), 3)),
                kind => Err(EngineError::rejected(format!(
                    "{kind:?} lines have a fixed set of points"
                ))),
            },
            Entity::Spline(spline) => {
                let minimum = if spline.is_closed() { 3 } else { 2 };
                Ok((spline.len(), minimum))
            }
            other => Err(EngineError::rejected(format!(
                "{} objects have no point chain",
                other.kind()
            ))),
        }
    }

    fn apply_add_point(
        &mut self,
        target: EntityId,
        index: usize,
        point: Point,
        sfactor: Option<f64>,
    ) -> Result<UndoRecord, EngineError> {
        let (count, _) = self.point_chain(target)?;
        if index > count {
            return Err(EngineError::rejected(format!(
                "point index {index} is beyond the {count} points of {target}"
            )));
        }
        let sfactor = match self.store.get(target)? {
            Entity::Spline(spline) => Some(sfactor.unwrap_or_else(|| spline.kind.default_sfactor())),
            _ => None,
        };
        let change = PointChange {
            target,
            index,
            point,
            sfactor,
        };
        let before = self.region(&[target]);
        self.clean_up()?;
        insert_point(&mut self.store, &change)?;
        let region = Bounds::union(before, self.region(&[target]));
        self.mark_dirty(region);
        Ok(UndoRecord::AddPoint(change))
    }

    fn apply_delete_point(
        &mut self,
        target: EntityId,
        index: usize,
    ) -> Result<UndoRecord, EngineError> {
        let (count, minimum) = self.point_chain(target)?;
        if index >= count {
            return Err(EngineError::rejected(format!(
                "point index {index} is beyond the {count} points of {target}"
            )));
        }
        if count <= minimum {
            return Err(EngineError::rejected(format!(
                "{target} cannot lose another point"
            )));
        }
        let before = self.region(&[target]);
        self.clean_up()?;
        let change = remove_point(&mut self.store, target, index)?;
        self.mark_dirty(before);
        Ok(UndoRecord::DeletePoint(change))
    }

    /// 只有开口图元的端点可以带箭头；`occupied` 是该端点当前应处的状态。
    fn ensure_arrow_slot(
        &self,
        target: EntityId,
        end: ArrowEnd,
        occupied: bool,
    ) -> Result<(), EngineError> {
        self.ensure_top_level(target)?;
        let entity = self.store.get(target)?;
        let open = match entity {
            Entity::Line(line) => line.kind == LineKind::Polyline,
            Entity::Spline(spline) => !spline.is_closed(),
            Entity::Arc(arc) => arc.kind == ArcKind::Open,
            _ => false,
        };
        let Some(arrows) = entity.arrows().filter(|_| open) else {
            return Err(EngineError::rejected(format!(
                "{target} is not an open object with arrowheads"
            )));
        };
        match (arrows.get(end).is_some(), occupied) {
            (true, false) => Err(EngineError::rejected(format!(
                "{target} already has a {end:?} arrowhead"
            ))),
            (false, true) => Err(EngineError::rejected(format!(
                "{target} has no {end:?} arrowhead"
            ))),
            _ => Ok(()),
        }
    }

    /// 以游离状态登记新生成的图元；任何一个失败时释放已登记的部分。
    fn prepare(&mut self, entities: Vec<Entity>) -> Result<Vec<EntityId>, EngineError> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            match self.store.insert(entity) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    self.release_prepared(&ids);
                    return Err(err.into());
                }
            }
        }
        Ok(ids)
    }

    fn release_prepared(&mut self, ids: &[EntityId]) {
        for id in ids {
            if let Err(err) = self.store.free(*id) {
                warn!(id = %id, error = %err, "无法释放预先分配的图元");
            }
        }
    }

    fn commit_prepared(
        &mut self,
        action: ActionKind,
        saved: Vec<EntityId>,
        live: Vec<EntityId>,
    ) -> Result<UndoRecord, EngineError> {
        let prepared = live.clone();
        self.commit_exchange(action, saved, live)
            .inspect_err(|_| self.release_prepared(&prepared))
    }

    fn commit_exchange(
        &mut self,
        action: ActionKind,
        saved: Vec<EntityId>,
        live: Vec<EntityId>,
    ) -> Result<UndoRecord, EngineError> {
        let before = self.region(&saved);
        self.clean_up()?;
        let root = self.store.root();
        exchange(&mut self.store, root, &saved, &live)?;
        for id in &saved {
            self.selected.remove(id);
        }
        let region = Bounds::union(before, self.region(&live));
        self.mark_dirty(region);
        self.latest = live.clone();
        Ok(UndoRecord::Exchange {
            action,
            saved,
            live,
        })
    }

    fn unlink(&mut self, entities: &[EntityId]) -> Result<(), EngineError> {
        let root = self.store.root();
        self.store.with_bulk_depths(|store| {
            entities
                .iter()
                .try_for_each(|id| store.list_delete(root, *id).map(|_| ()))
        })?;
        for id in entities {
            self.selected.remove(id);
        }
        Ok(())
    }

    fn translate(&mut self, entities: &[EntityId], dx: i32, dy: i32) -> Result<(), EngineError> {
        let before = self.region(entities);
        for id in entities {
            self.store.translate(*id, dx, dy)?;
        }
        self.hooks.adjust_smart_links(entities, dx, dy);
        let region = Bounds::union(before, self.region(entities));
        self.mark_dirty(region);
        Ok(())
    }

    fn scale(&mut self, target: EntityId, fix: Point, sx: f64, sy: f64) -> Result<(), EngineError> {
        let before = self.region(&[target]);
        self.store.scale(target, fix, sx, sy)?;
        self.hooks.adjust_scaled_links(target, fix, sx, sy);
        let region = Bounds::union(before, self.region(&[target]));
        self.mark_dirty(region);
        Ok(())
    }

    // ---- 撤销 ----

    /// 撤销最近一次修改，槽位随后记录其逆操作，再次调用即重做。
    pub fn undo(&mut self) -> Result<UndoOutcome, EngineError> {
        let Some(record) = self.undo.take() else {
            info!("没有可撤销的操作");
            return Ok(UndoOutcome::NothingToUndo);
        };
        let action = record.action();
        match self.revert(&record) {
            Ok(inverse) => {
                debug!(action = %action, now = %inverse.action(), "已撤销操作");
                self.undo = Some(inverse);
                self.after_change()?;
                Ok(UndoOutcome::Reverted(action))
            }
            Err(err) => {
                warn!(action = %action, error = %err, "撤销失败");
                self.undo = Some(record);
                Err(err)
            }
        }
    }

    fn revert(&mut self, record: &UndoRecord) -> Result<UndoRecord, EngineError> {
        let root = self.store.root();
        let inverse = match record {
            UndoRecord::Add { entities } => {
                let region = self.region(entities);
                self.unlink(entities)?;
                self.mark_dirty(region);
                self.latest.clear();
                UndoRecord::Delete {
                    entities: entities.clone(),
                }
            }
            UndoRecord::Delete { entities } => {
                self.store.with_bulk_depths(|store| {
                    entities.iter().try_for_each(|id| store.list_add(root, *id))
                })?;
                let region = self.region(entities);
                self.mark_dirty(region);
                self.latest = entities.clone();
                UndoRecord::Add {
                    entities: entities.clone(),
                }
            }
            UndoRecord::Move { entities, from, to } => {
                let delta = to.offset_to(*from);
                self.translate(entities, delta.x, delta.y)?;
                UndoRecord::Move {
                    entities: entities.clone(),
                    from: *to,
                    to: *from,
                }
            }
            UndoRecord::Scale {
                target,
                fix,
                from,
                to,
            } => {
                let (sx, sy) = scale_factors(*fix, *to, *from)?;
                self.scale(*target, *fix, sx, sy)?;
                UndoRecord::Scale {
                    target: *target,
                    fix: *fix,
                    from: *to,
                    to: *from,
                }
            }
            UndoRecord::Exchange {
                action,
                saved,
                live,
            } => {
                let before = self.region(live);
                exchange(&mut self.store, root, live, saved)?;
                for id in live {
                    self.selected.remove(id);
                }
                let region = Bounds::union(before, self.region(saved));
                self.mark_dirty(region);
                self.latest = saved.clone();
                UndoRecord::Exchange {
                    action: *action,
                    saved: live.clone(),
                    live: saved.clone(),
                }
            }
            UndoRecord::Glue { compound } => {
                self.latest = self.store.break_apart(root, *compound)?;
                self.selected.remove(compound);
                UndoRecord::Break {
                    compound: *compound,
                }
            }
            UndoRecord::Break { compound } => {
                let members: Vec<EntityId> = self
                    .store
                    .get_as::<Compound>(*compound)?
                    .children()
                    .map(|(_, member)| member)
                    .collect();
                self.store.glue(root, *compound, &members)?;
                for id in &members {
                    self.selected.remove(id);
                }
                self.latest = vec![*compound];
                UndoRecord::Glue {
                    compound: *compound,
                }
            }
            UndoRecord::Load {
                saved_root,
                saved_name,
            } => {
                let current = self.store.swap_root(*saved_root)?;
                let name = mem::replace(&mut self.figure_name, saved_name.clone());
                self.selected.clear();
                self.latest.clear();
                let region = Bounds::union(self.region(&[current]), self.region(&[*saved_root]));
                self.mark_dirty(region);
                UndoRecord::Load {
                    saved_root: current,
                    saved_name: name,
                }
            }
            UndoRecord::AddPoint(change) => {
                let before = self.region(&[change.target]);
                let removed = remove_point(&mut self.store, change.target, change.index)?;
                self.mark_dirty(before);
                UndoRecord::DeletePoint(removed)
            }
            UndoRecord::DeletePoint(change) => {
                insert_point(&mut self.store, change)?;
                let region = self.region(&[change.target]);
                self.mark_dirty(region);
                UndoRecord::AddPoint(change.clone())
            }
            UndoRecord::AddArrowHead(change) => {
                let removed = detach_arrow(&mut self.store, change.target, change.end)?;
                let region = self.region(&[change.target]);
                self.mark_dirty(region);
                UndoRecord::DeleteArrowHead(removed)
            }
            UndoRecord::DeleteArrowHead(change) => {
                attach_arrow(&mut self.store, change)?;
                let region = self.region(&[change.target]);
                self.mark_dirty(region);
                UndoRecord::AddArrowHead(change.clone())
            }
        };
        Ok(inverse)
    }
}
