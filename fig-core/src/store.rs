//! 图元仓库。
//!
//! 所有图元平铺存放在以 [`EntityId`] 为键的表中，组合体只保存子图元 ID，
//! 每个槽位额外记录唯一的所属容器。`parent == None` 且不是根的图元处于
//! “游离”状态：刚创建，或者由撤销槽位保管。
//!
//! 只有从根组合体可达的图元参与深度计数；所有链接/断开原语都在修改列表的
//! 同时维护 [`DepthTable`]。

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::depth::{DepthRange, DepthTable};
use crate::entity::{Arrows, Compound, Entity, EntityId, MAX_DEPTH, ObjectKind, Variant};
use crate::errors::CoreError;
use crate::geometry::{Bounds, Point};
use crate::picture::PictureCache;

#[derive(Debug)]
struct Slot {
    entity: Entity,
    parent: Option<EntityId>,
}

#[derive(Debug)]
pub struct ObjectStore {
    slots: HashMap<EntityId, Slot>,
    next_entity_id: u64,
    root: EntityId,
    depths: DepthTable,
    pictures: PictureCache,
    #[cfg(test)]
    alloc_budget: Option<usize>,
}

impl ObjectStore {
    pub fn new() -> Self {
        let root = EntityId::new(0);
        let mut slots = HashMap::new();
        slots.insert(
            root,
            Slot {
                entity: Entity::Compound(Compound::new()),
                parent: None,
            },
        );
        Self {
            slots,
            next_entity_id: 1,
            root,
            depths: DepthTable::new(),
            pictures: PictureCache::new(),
            #[cfg(test)]
            alloc_budget: None,
        }
    }

    #[inline]
    pub fn root(&self) -> EntityId {
        self.root
    }

    #[inline]
    pub fn depths(&self) -> &DepthTable {
        &self.depths
    }

    /// 自上次调用以来深度范围有变化时返回新范围。
    pub fn take_depth_range_change(&mut self) -> Option<Option<DepthRange>> {
        self.depths.take_range_change()
    }

    #[inline]
    pub fn pictures(&self) -> &PictureCache {
        &self.pictures
    }

    #[inline]
    pub fn pictures_mut(&mut self) -> &mut PictureCache {
        &mut self.pictures
    }

    /// 仓库中的图元数量，包含根组合体与游离图元。
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity, CoreError> {
        self.slots
            .get(&id)
            .map(|slot| &slot.entity)
            .ok_or(CoreError::EntityNotFound(id.get()))
    }

    pub fn get_as<T: Variant>(&self, id: EntityId) -> Result<&T, CoreError> {
        let entity = self.get(id)?;
        T::from_entity(entity).ok_or(CoreError::WrongKind {
            id: id.get(),
            expected: T::KIND,
            actual: entity.kind(),
        })
    }

    pub fn kind_of(&self, id: EntityId) -> Result<ObjectKind, CoreError> {
        self.get(id).map(Entity::kind)
    }

    fn compound(&self, id: EntityId) -> Result<&Compound, CoreError> {
        match self.get(id)? {
            Entity::Compound(compound) => Ok(compound),
            _ => Err(CoreError::NotACompound(id.get())),
        }
    }

    fn compound_mut(&mut self, id: EntityId) -> Result<&mut Compound, CoreError> {
        match self.slots.get_mut(&id).map(|slot| &mut slot.entity) {
            Some(Entity::Compound(compound)) => Ok(compound),
            Some(_) => Err(CoreError::NotACompound(id.get())),
            None => Err(CoreError::EntityNotFound(id.get())),
        }
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.slots.get(&id).and_then(|slot| slot.parent)
    }

    /// 存在、不是根且未被任何容器持有。
    pub fn is_detached(&self, id: EntityId) -> bool {
        id != self.root && self.slots.get(&id).is_some_and(|slot| slot.parent.is_none())
    }

    /// 沿所属链可以走到根组合体。
    pub fn is_attached(&self, id: EntityId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity, Option<EntityId>)> + '_ {
        self.slots
            .iter()
            .map(|(id, slot)| (*id, &slot.entity, slot.parent))
    }

    /// 所有游离图元，按 ID 升序。
    pub fn detached(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .slots
            .iter()
            .filter(|(id, slot)| **id != self.root && slot.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    fn charge_allocation(&mut self) -> Result<(), CoreError> {
        if let Some(budget) = self.alloc_budget.as_mut() {
            if *budget == 0 {
                return Err(CoreError::OutOfMemory("object storage"));
            }
            *budget -= 1;
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[inline]
    fn charge_allocation(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    /// 以游离状态登记新图元。组合体必须为空，子图元随后通过 [`Self::list_add`] 链接。
    pub fn insert(&mut self, entity: impl Into<Entity>) -> Result<EntityId, CoreError> {
        let entity = entity.into();
        if let Some(depth) = entity.depth() {
            if depth > MAX_DEPTH {
                return Err(CoreError::DepthOutOfRange(i64::from(depth)));
            }
        }
        if let Entity::Compound(compound) = &entity {
            if !compound.is_empty() {
                return Err(CoreError::InvariantViolation(
                    "compounds must be inserted without children".to_string(),
                ));
            }
        }
        self.charge_allocation()?;
        self.slots.try_reserve(1)?;
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;
        self.slots.insert(
            id,
            Slot {
                entity,
                parent: None,
            },
        );
        Ok(id)
    }

    fn walk_depths(
        slots: &HashMap<EntityId, Slot>,
        depths: &mut DepthTable,
        id: EntityId,
        adding: bool,
    ) -> Result<(), CoreError> {
        let slot = slots
            .get(&id)
            .ok_or(CoreError::EntityNotFound(id.get()))?;
        match &slot.entity {
            Entity::Compound(compound) => {
                for (_, child) in compound.children() {
                    let owned = slots
                        .get(&child)
                        .is_some_and(|child_slot| child_slot.parent == Some(id));
                    if owned {
                        Self::walk_depths(slots, depths, child, adding)?;
                    }
                }
                Ok(())
            }
            entity => {
                let Some(depth) = entity.depth() else {
                    return Ok(());
                };
                if adding {
                    depths.add(entity.kind(), depth)
                } else {
                    depths.remove(entity.kind(), depth)
                }
            }
        }
    }

    /// 将 `id` 子树中的每个基本图元计入深度表。
    pub fn add_compound_depth(&mut self, id: EntityId) -> Result<(), CoreError> {
        self.depths.begin_bulk();
        let result = Self::walk_depths(&self.slots, &mut self.depths, id, true);
        self.depths.end_bulk();
        result
    }

    pub fn remove_compound_depth(&mut self, id: EntityId) -> Result<(), CoreError> {
        self.depths.begin_bulk();
        let result = Self::walk_depths(&self.slots, &mut self.depths, id, false);
        self.depths.end_bulk();
        result
    }

    /// 在一个批量区段内执行 `f`，边界扫描与范围变化通知推迟到区段结束。
    pub fn with_bulk_depths<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        self.depths.begin_bulk();
        let result = f(self);
        self.depths.end_bulk();
        result
    }

    fn ensure_linkable(&self, container: EntityId, id: EntityId) -> Result<(), CoreError> {
        self.compound(container)?;
        self.get(id)?;
        if !self.is_detached(id) {
            return Err(CoreError::NotDetached(id.get()));
        }
        let mut current = Some(container);
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(CoreError::InvariantViolation(format!(
                    "linking {id} into {container} would create a cycle"
                )));
            }
            current = self.parent(ancestor);
        }
        Ok(())
    }

    /// 把游离图元追加到容器中对应种类的列表末尾。
    pub fn list_add(&mut self, container: EntityId, id: EntityId) -> Result<(), CoreError> {
        self.ensure_linkable(container, id)?;
        let kind = self.kind_of(id)?;
        self.compound_mut(container)?.list_mut(kind).try_reserve(1)?;
        if self.is_attached(container) {
            self.add_compound_depth(id)?;
        }
        self.compound_mut(container)?.list_mut(kind).push(id);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.parent = Some(container);
        }
        Ok(())
    }

    fn position_in(&self, container: EntityId, id: EntityId) -> Result<Option<usize>, CoreError> {
        let compound = self.compound(container)?;
        if self.parent(id) != Some(container) {
            return Ok(None);
        }
        let kind = self.kind_of(id)?;
        Ok(compound.list(kind).iter().position(|child| *child == id))
    }

    /// 从容器中断开 `id`，图元本身保留为游离状态。
    ///
    /// 容器不持有该图元时不做任何修改并返回 `Ok(false)`。
    pub fn list_delete(&mut self, container: EntityId, id: EntityId) -> Result<bool, CoreError> {
        let Some(position) = self.position_in(container, id)? else {
            if cfg!(debug_assertions) {
                warn!(container = %container, id = %id, "删除的图元不在容器中");
            }
            return Ok(false);
        };
        let kind = self.kind_of(id)?;
        if self.is_attached(container) {
            self.remove_compound_depth(id)?;
        }
        self.compound_mut(container)?.list_mut(kind).remove(position);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.parent = None;
        }
        Ok(true)
    }

    /// 用游离图元 `new` 取代容器中的 `old`，`old` 变为游离。
    ///
    /// 同种类时保持列表位置；不同种类时 `old` 被移出、`new` 追加到自己的列表。
    pub fn swap_in_place(
        &mut self,
        container: EntityId,
        old: EntityId,
        new: EntityId,
    ) -> Result<(), CoreError> {
        let position = self
            .position_in(container, old)?
            .ok_or(CoreError::EntityNotFound(old.get()))?;
        self.ensure_linkable(container, new)?;
        let old_kind = self.kind_of(old)?;
        let new_kind = self.kind_of(new)?;
        if old_kind != new_kind {
            self.compound_mut(container)?.list_mut(new_kind).try_reserve(1)?;
        }
        if self.is_attached(container) {
            self.with_bulk_depths(|store| {
                store.remove_compound_depth(old)?;
                store.add_compound_depth(new)
            })?;
        }
        let compound = self.compound_mut(container)?;
        if old_kind == new_kind {
            compound.list_mut(old_kind)[position] = new;
        } else {
            compound.list_mut(old_kind).remove(position);
            compound.list_mut(new_kind).push(new);
        }
        if let Some(slot) = self.slots.get_mut(&old) {
            slot.parent = None;
        }
        if let Some(slot) = self.slots.get_mut(&new) {
            slot.parent = Some(container);
        }
        debug!(container = %container, old = %old, new = %new, "已原位交换图元");
        Ok(())
    }

    /// 把 `members` 从容器移入游离组合体 `compound`，再把组合体链接进容器。
    ///
    /// 组合体原有的子列表被 `members` 取代。深度计数净变化为零。
    pub fn glue(
        &mut self,
        container: EntityId,
        compound: EntityId,
        members: &[EntityId],
    ) -> Result<(), CoreError> {
        self.ensure_linkable(container, compound)?;
        self.compound(compound)?;
        let mut lists = Compound::new();
        for member in members {
            if *member == compound || self.parent(*member) != Some(container) {
                return Err(CoreError::InvariantViolation(format!(
                    "{member} is not a member of {container}"
                )));
            }
            let kind = self.kind_of(*member)?;
            if lists.contains(kind, *member) {
                return Err(CoreError::InvariantViolation(format!(
                    "{member} listed twice"
                )));
            }
            let list = lists.list_mut(kind);
            list.try_reserve(1)?;
            list.push(*member);
        }
        self.compound_mut(container)?
            .list_mut(ObjectKind::Compound)
            .try_reserve(1)?;

        let outer = self.compound_mut(container)?;
        for member in members {
            for kind in ObjectKind::PRIMITIVES
                .into_iter()
                .chain([ObjectKind::Compound])
            {
                outer.list_mut(kind).retain(|child| child != member);
            }
        }
        outer.list_mut(ObjectKind::Compound).push(compound);

        let inner = self.compound_mut(compound)?;
        for kind in ObjectKind::PRIMITIVES
            .into_iter()
            .chain([ObjectKind::Compound])
        {
            *inner.list_mut(kind) = std::mem::take(lists.list_mut(kind));
        }
        for member in members {
            if let Some(slot) = self.slots.get_mut(member) {
                slot.parent = Some(compound);
            }
        }
        if let Some(slot) = self.slots.get_mut(&compound) {
            slot.parent = Some(container);
        }
        debug!(compound = %compound, members = members.len(), "已组合图元");
        Ok(())
    }

    /// 把组合体的成员移交给容器，组合体变为游离的外壳。
    ///
    /// 外壳的子列表保持不变，作为成员的镜像供撤销时重新组合。返回被移交的成员。
    pub fn break_apart(
        &mut self,
        container: EntityId,
        compound: EntityId,
    ) -> Result<Vec<EntityId>, CoreError> {
        let position = self
            .position_in(container, compound)?
            .ok_or(CoreError::EntityNotFound(compound.get()))?;
        let members: Vec<(ObjectKind, EntityId)> = self
            .compound(compound)?
            .children()
            .filter(|(_, child)| self.parent(*child) == Some(compound))
            .collect();

        let outer = self.compound_mut(container)?;
        for kind in ObjectKind::PRIMITIVES
            .into_iter()
            .chain([ObjectKind::Compound])
        {
            let extra = members.iter().filter(|(k, _)| *k == kind).count();
            outer.list_mut(kind).try_reserve(extra)?;
        }
        outer.list_mut(ObjectKind::Compound).remove(position);
        for (kind, member) in &members {
            outer.list_mut(*kind).push(*member);
        }
        for (_, member) in &members {
            if let Some(slot) = self.slots.get_mut(member) {
                slot.parent = Some(container);
            }
        }
        if let Some(slot) = self.slots.get_mut(&compound) {
            slot.parent = None;
        }
        debug!(compound = %compound, members = members.len(), "已拆散组合体");
        Ok(members.into_iter().map(|(_, member)| member).collect())
    }

    /// 用游离组合体取代文档根，返回旧根（随后处于游离状态）。
    pub fn swap_root(&mut self, new_root: EntityId) -> Result<EntityId, CoreError> {
        self.compound(new_root)?;
        if !self.is_detached(new_root) {
            return Err(CoreError::NotDetached(new_root.get()));
        }
        let old_root = self.root;
        self.with_bulk_depths(|store| {
            store.remove_compound_depth(old_root)?;
            store.root = new_root;
            store.add_compound_depth(new_root)
        })?;
        debug!(old = %old_root, new = %new_root, "已替换文档根");
        Ok(old_root)
    }

    /// 释放游离图元及其拥有的子树。不存在的 ID 不做任何处理。
    pub fn free(&mut self, id: EntityId) -> Result<(), CoreError> {
        let Some(slot) = self.slots.get(&id) else {
            return Ok(());
        };
        if id == self.root || slot.parent.is_some() {
            return Err(CoreError::InvariantViolation(format!(
                "cannot free {id} while it is linked into the document"
            )));
        }
        let mut pending = vec![id];
        let mut freed = 0usize;
        while let Some(current) = pending.pop() {
            let Some(slot) = self.slots.remove(&current) else {
                continue;
            };
            if let Entity::Compound(compound) = &slot.entity {
                pending.extend(
                    compound
                        .children()
                        .map(|(_, child)| child)
                        .filter(|child| self.parent(*child) == Some(current)),
                );
            }
            freed += 1;
        }
        debug!(id = %id, freed, "已释放图元");
        Ok(())
    }

    /// 深拷贝图元（组合体连同其拥有的子树），副本处于游离状态。
    ///
    /// 中途失败时已分配的副本全部释放。
    pub fn clone_entity(&mut self, id: EntityId) -> Result<EntityId, CoreError> {
        let mut allocated = Vec::new();
        match self.clone_into(id, &mut allocated) {
            Ok(copy) => Ok(copy),
            Err(err) => {
                warn!(id = %id, allocated = allocated.len(), error = %err, "复制图元失败");
                for copy in allocated.into_iter().rev() {
                    self.slots.remove(&copy);
                }
                Err(err)
            }
        }
    }

    fn clone_into(
        &mut self,
        id: EntityId,
        allocated: &mut Vec<EntityId>,
    ) -> Result<EntityId, CoreError> {
        let source = self.get(id)?;
        let entity = source.try_clone()?;
        let children: Vec<(ObjectKind, EntityId)> = match source {
            Entity::Compound(compound) => compound
                .children()
                .filter(|(_, child)| self.parent(*child) == Some(id))
                .collect(),
            _ => Vec::new(),
        };
        let copy = self.insert(entity)?;
        allocated.push(copy);
        for (kind, child) in children {
            let child_copy = self.clone_into(child, allocated)?;
            let list = self.compound_mut(copy)?.list_mut(kind);
            list.try_reserve(1)?;
            list.push(child_copy);
            if let Some(slot) = self.slots.get_mut(&child_copy) {
                slot.parent = Some(copy);
            }
        }
        Ok(copy)
    }

    /// `id` 拥有的全部后代（不含自身），先序排列。
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Ok(Entity::Compound(compound)) = self.get(current) {
                let owned: Vec<_> = compound
                    .children()
                    .map(|(_, child)| child)
                    .filter(|child| self.parent(*child) == Some(current))
                    .collect();
                for child in owned.into_iter().rev() {
                    out.push(child);
                    pending.push(child);
                }
            }
        }
        out
    }

    fn subtree(&self, id: EntityId) -> Result<Vec<EntityId>, CoreError> {
        self.get(id)?;
        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        Ok(ids)
    }

    pub fn translate(&mut self, id: EntityId, dx: i32, dy: i32) -> Result<(), CoreError> {
        for current in self.subtree(id)? {
            if let Some(slot) = self.slots.get_mut(&current) {
                slot.entity.translate(dx, dy);
            }
        }
        Ok(())
    }

    pub fn scale(&mut self, id: EntityId, fix: Point, sx: f64, sy: f64) -> Result<(), CoreError> {
        for current in self.subtree(id)? {
            if let Some(slot) = self.slots.get_mut(&current) {
                slot.entity.scale_about(fix, sx, sy);
            }
        }
        Ok(())
    }

    /// 以具体类型修改图元。深度变化时同步深度表，越界则恢复原深度。
    pub fn modify<T: Variant, R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CoreError> {
        let attached = self.is_attached(id);
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id.get()))?;
        let kind = slot.entity.kind();
        let old_depth = slot.entity.depth();
        let target = T::from_entity_mut(&mut slot.entity).ok_or(CoreError::WrongKind {
            id: id.get(),
            expected: T::KIND,
            actual: kind,
        })?;
        let result = f(target);
        let new_depth = slot.entity.depth();
        if let (Some(old), Some(new)) = (old_depth, new_depth) {
            if new > MAX_DEPTH {
                slot.entity.set_depth(old);
                return Err(CoreError::DepthOutOfRange(i64::from(new)));
            }
            if old != new && attached {
                self.with_bulk_depths(|store| {
                    store.depths.remove(kind, old)?;
                    store.depths.add(kind, new)
                })?;
            }
        }
        Ok(result)
    }

    /// 修改带箭头图元的箭头槽位。
    pub fn modify_arrows<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Arrows) -> R,
    ) -> Result<R, CoreError> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id.get()))?;
        let kind = slot.entity.kind();
        let arrows = slot.entity.arrows_mut().ok_or(CoreError::WrongKind {
            id: id.get(),
            expected: ObjectKind::Line,
            actual: kind,
        })?;
        Ok(f(arrows))
    }

    /// 定义点的外包盒；组合体取其拥有子图元的并集，没有子图元时取自身角点。
    pub fn defining_bounds(&self, id: EntityId) -> Option<Bounds> {
        match self.get(id).ok()? {
            Entity::Compound(compound) => {
                let children = compound
                    .children()
                    .filter(|(_, child)| self.parent(*child) == Some(id))
                    .fold(None, |acc, (_, child)| {
                        Bounds::union(acc, self.defining_bounds(child))
                    });
                children.or(Some(compound.bounds()))
            }
            entity => Bounds::from_points(entity.defining_points()),
        }
    }

    /// 从根重新统计深度并与维护中的深度表比较。
    pub fn verify_depths(&self) -> Result<(), CoreError> {
        let mut expected = DepthTable::new();
        Self::walk_depths(&self.slots, &mut expected, self.root, true)?;
        match self.depths.first_mismatch(&expected) {
            Some(mismatch) => Err(CoreError::InvariantViolation(mismatch)),
            None => Ok(()),
        }
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::entity::{Line, LineKind, Picture, Style, Text};
    use crate::picture::PictureData;

    fn line_at(depth: u16, x: i32) -> Line {
        Line::polyline([Point::new(x, 0), Point::new(x + 10, 10)]).with_style(Style::at_depth(depth))
    }

    #[test]
    fn nested_compound_is_counted_when_linked() {
        let mut store = ObjectStore::new();
        let group = store.insert(Compound::new()).unwrap();
        let line = store.insert(line_at(2, 0)).unwrap();
        let text = store.insert(Text::new(Point::new(5, 5), "label").at_depth(7)).unwrap();
        store.list_add(group, line).unwrap();
        store.list_add(group, text).unwrap();
        assert!(store.depths().is_empty());

        store.list_add(store.root(), group).unwrap();
        assert_eq!(store.depths().count(2), 1);
        assert_eq!(store.depths().count(7), 1);
        assert_eq!(store.depths().range(), Some(DepthRange { min: 2, max: 7 }));
        store.verify_depths().unwrap();

        assert!(store.list_delete(store.root(), group).unwrap());
        assert!(store.depths().is_empty());
        assert!(store.is_detached(group));
        assert_eq!(store.parent(line), Some(group));
        store.verify_depths().unwrap();
    }

    #[test]
    fn deleting_an_absent_entity_is_a_no_op() {
        let mut store = ObjectStore::new();
        let line = store.insert(line_at(10, 0)).unwrap();
        store.list_add(store.root(), line).unwrap();
        let stray = store.insert(line_at(10, 50)).unwrap();

        assert!(!store.list_delete(store.root(), stray).unwrap());
        assert!(!store.list_delete(store.root(), EntityId::new(999)).unwrap());
        assert_eq!(store.depths().count(10), 1);
        assert!(store.list_delete(store.root(), line).unwrap());
        assert!(!store.list_delete(store.root(), line).unwrap());
        assert_eq!(store.depths().count(10), 0);
    }

    #[test]
    fn linking_requires_a_detached_entity_and_no_cycle() {
        let mut store = ObjectStore::new();
        let outer = store.insert(Compound::new()).unwrap();
        let inner = store.insert(Compound::new()).unwrap();
        store.list_add(outer, inner).unwrap();
        assert_eq!(
            store.list_add(store.root(), inner),
            Err(CoreError::NotDetached(inner.get()))
        );
        assert!(matches!(
            store.list_add(inner, outer),
            Err(CoreError::InvariantViolation(_))
        ));
        let line = store.insert(line_at(1, 0)).unwrap();
        assert_eq!(
            store.list_add(line, outer),
            Err(CoreError::NotACompound(line.get()))
        );
    }

    #[test]
    fn failed_clone_releases_partial_copies() {
        let mut store = ObjectStore::new();
        let group = store.insert(Compound::new()).unwrap();
        for x in [0, 20, 40] {
            let line = store.insert(line_at(3, x)).unwrap();
            store.list_add(group, line).unwrap();
        }
        let before = store.len();

        store.alloc_budget = Some(2);
        let err = store.clone_entity(group).unwrap_err();
        assert_eq!(err, CoreError::OutOfMemory("object storage"));
        assert_eq!(store.len(), before);

        store.alloc_budget = None;
        let copy = store.clone_entity(group).unwrap();
        assert_eq!(store.descendants(copy).len(), 3);
        assert!(store.is_detached(copy));
        assert_eq!(store.defining_bounds(copy), store.defining_bounds(group));
    }

    #[test]
    fn picture_handles_follow_clone_and_free() {
        let mut store = ObjectStore::new();
        let source = store
            .pictures_mut()
            .acquire("photo.png", |path| Ok::<_, Infallible>(PictureData::new(path)))
            .unwrap();
        let line = store
            .insert(Line::picture(
                Point::new(0, 0),
                Point::new(100, 80),
                Picture::new(source),
            ))
            .unwrap();
        assert_eq!(store.pictures().refcount("photo.png"), 1);

        let copy = store.clone_entity(line).unwrap();
        assert_eq!(store.pictures().refcount("photo.png"), 2);
        store.free(copy).unwrap();
        assert_eq!(store.pictures().refcount("photo.png"), 1);
        store.free(line).unwrap();
        assert!(!store.pictures().is_alive("photo.png"));
    }

    #[test]
    fn free_rejects_linked_entities_and_ignores_missing_ones() {
        let mut store = ObjectStore::new();
        let line = store.insert(line_at(4, 0)).unwrap();
        store.list_add(store.root(), line).unwrap();
        assert!(matches!(store.free(line), Err(CoreError::InvariantViolation(_))));
        assert!(store.free(store.root()).is_err());
        assert_eq!(store.free(EntityId::new(4242)), Ok(()));
    }

    #[test]
    fn swap_in_place_keeps_position_for_the_same_kind() {
        let mut store = ObjectStore::new();
        let root = store.root();
        let first = store.insert(line_at(5, 0)).unwrap();
        let second = store.insert(line_at(5, 20)).unwrap();
        store.list_add(root, first).unwrap();
        store.list_add(root, second).unwrap();

        let replacement = store.insert(line_at(8, 0)).unwrap();
        store.swap_in_place(root, first, replacement).unwrap();
        let lines = store.get_as::<Compound>(root).unwrap().list(ObjectKind::Line).to_vec();
        assert_eq!(lines, vec![replacement, second]);
        assert!(store.is_detached(first));
        assert_eq!(store.depths().count(5), 1);
        assert_eq!(store.depths().count(8), 1);

        let text = store.insert(Text::new(Point::new(0, 0), "t").at_depth(5)).unwrap();
        store.swap_in_place(root, second, text).unwrap();
        let compound = store.get_as::<Compound>(root).unwrap();
        assert_eq!(compound.list(ObjectKind::Line), &[replacement]);
        assert_eq!(compound.list(ObjectKind::Text), &[text]);
        assert_eq!(store.depths().count_of(ObjectKind::Text, 5), 1);
        store.verify_depths().unwrap();
    }

    #[test]
    fn glue_and_break_leave_depths_untouched() {
        let mut store = ObjectStore::new();
        let root = store.root();
        let a = store.insert(line_at(6, 0)).unwrap();
        let b = store.insert(line_at(9, 30)).unwrap();
        store.list_add(root, a).unwrap();
        store.list_add(root, b).unwrap();

        let group = store.insert(Compound::new()).unwrap();
        store.glue(root, group, &[a, b]).unwrap();
        assert_eq!(store.parent(a), Some(group));
        assert_eq!(store.depths().total(), 2);
        store.verify_depths().unwrap();

        let members = store.break_apart(root, group).unwrap();
        assert_eq!(members, vec![a, b]);
        assert!(store.is_detached(group));
        assert_eq!(store.get_as::<Compound>(group).unwrap().child_count(), 2);
        assert!(store.descendants(group).is_empty());
        store.verify_depths().unwrap();

        store.free(group).unwrap();
        assert!(store.contains(a) && store.contains(b));
    }

    #[test]
    fn swap_root_recounts_depths() {
        let mut store = ObjectStore::new();
        let old_line = store.insert(line_at(1, 0)).unwrap();
        store.list_add(store.root(), old_line).unwrap();

        let figure = store.insert(Compound::new()).unwrap();
        let new_line = store.insert(line_at(30, 0)).unwrap();
        store.list_add(figure, new_line).unwrap();

        let old_root = store.swap_root(figure).unwrap();
        assert_eq!(store.root(), figure);
        assert!(store.is_detached(old_root));
        assert_eq!(store.depths().range(), Some(DepthRange { min: 30, max: 30 }));
        store.verify_depths().unwrap();
    }

    #[test]
    fn depth_edits_update_the_table() {
        let mut store = ObjectStore::new();
        let line = store.insert(line_at(12, 0)).unwrap();
        store.list_add(store.root(), line).unwrap();

        store.modify::<Line, _>(line, |line| line.style.depth = 20).unwrap();
        assert_eq!(store.depths().count(12), 0);
        assert_eq!(store.depths().count(20), 1);

        let err = store.modify::<Line, _>(line, |line| line.style.depth = 1200);
        assert_eq!(err, Err(CoreError::DepthOutOfRange(1200)));
        assert_eq!(store.get_as::<Line>(line).unwrap().style.depth, 20);

        assert!(matches!(
            store.modify::<Text, _>(line, |_| ()),
            Err(CoreError::WrongKind { .. })
        ));
        store.verify_depths().unwrap();
    }

    #[test]
    fn compound_translation_reaches_every_child() {
        let mut store = ObjectStore::new();
        let group = store.insert(Compound::new()).unwrap();
        let line = store.insert(Line::rectangle(LineKind::Box, Point::new(0, 0), Point::new(10, 10))).unwrap();
        store.list_add(group, line).unwrap();

        store.translate(group, 5, -5).unwrap();
        let bounds = store.defining_bounds(group).unwrap();
        assert_eq!(bounds.min(), Point::new(5, -5));
        store.translate(group, -5, 5).unwrap();
        assert_eq!(store.defining_bounds(line).unwrap().min(), Point::new(0, 0));
    }
}
