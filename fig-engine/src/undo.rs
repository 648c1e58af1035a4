//! 单槽撤销记录。
//!
//! 记录的变体就是最近一次动作的种类，并且只携带撤销该动作所需的状态。
//! 被删除、被替换的图元以及拆散后的组合体外壳以游离状态留在仓库中，
//! 直到下一次修改提交前由 [`UndoRecord::release`] 释放。

use std::slice;

use fig_core::entity::{Arrow, ArrowEnd, EntityId, Line, ObjectKind, Spline};
use fig_core::errors::CoreError;
use fig_core::geometry::Point;
use fig_core::store::ObjectStore;

use crate::errors::EngineError;
use crate::operation::ActionKind;

/// 折线或样条上一个点的增删。
#[derive(Debug, Clone, PartialEq)]
pub struct PointChange {
    pub target: EntityId,
    pub index: usize,
    pub point: Point,
    /// 只有样条带形状因子。
    pub sfactor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowChange {
    pub target: EntityId,
    pub end: ArrowEnd,
    pub arrow: Arrow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoRecord {
    Add {
        entities: Vec<EntityId>,
    },
    Delete {
        entities: Vec<EntityId>,
    },
    Move {
        entities: Vec<EntityId>,
        from: Point,
        to: Point,
    },
    Scale {
        target: EntityId,
        fix: Point,
        from: Point,
        to: Point,
    },
    /// 编辑、转换、开闭与合并/拆分共用：`saved` 是被换下的图元，`live` 是文档中的替代品。
    Exchange {
        action: ActionKind,
        saved: Vec<EntityId>,
        live: Vec<EntityId>,
    },
    Glue {
        compound: EntityId,
    },
    /// `compound` 是游离外壳，子列表仍指向已移交给根的成员。
    Break {
        compound: EntityId,
    },
    Load {
        saved_root: EntityId,
        saved_name: String,
    },
    AddPoint(PointChange),
    DeletePoint(PointChange),
    AddArrowHead(ArrowChange),
    DeleteArrowHead(ArrowChange),
}

impl UndoRecord {
    pub fn action(&self) -> ActionKind {
        match self {
            UndoRecord::Add { .. } => ActionKind::Add,
            UndoRecord::Delete { .. } => ActionKind::Delete,
            UndoRecord::Move { .. } => ActionKind::Move,
            UndoRecord::Scale { .. } => ActionKind::Scale,
            UndoRecord::Exchange { action, .. } => *action,
            UndoRecord::Glue { .. } => ActionKind::Glue,
            UndoRecord::Break { .. } => ActionKind::Break,
            UndoRecord::Load { .. } => ActionKind::Load,
            UndoRecord::AddPoint(_) => ActionKind::AddPoint,
            UndoRecord::DeletePoint(_) => ActionKind::DeletePoint,
            UndoRecord::AddArrowHead(_) => ActionKind::AddArrowHead,
            UndoRecord::DeleteArrowHead(_) => ActionKind::DeleteArrowHead,
        }
    }

    /// 记录独占保管、清理时将被释放的图元。
    pub fn saved(&self) -> &[EntityId] {
        match self {
            UndoRecord::Delete { entities } => entities,
            UndoRecord::Exchange { saved, .. } => saved,
            UndoRecord::Break { compound } => slice::from_ref(compound),
            UndoRecord::Load { saved_root, .. } => slice::from_ref(saved_root),
            _ => &[],
        }
    }

    #[inline]
    pub fn holds(&self, id: EntityId) -> bool {
        self.saved().contains(&id)
    }

    /// 释放记录保管的图元。
    pub fn release(self, store: &mut ObjectStore) -> Result<(), CoreError> {
        for id in self.saved() {
            store.free(*id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    NothingToUndo,
    /// 被撤销的动作；槽位随后记录它的逆操作。
    Reverted(ActionKind),
}

/// 在容器中用 `incoming` 替换 `outgoing`：首对原位交换，其余分别移出与追加。
pub(crate) fn exchange(
    store: &mut ObjectStore,
    container: EntityId,
    outgoing: &[EntityId],
    incoming: &[EntityId],
) -> Result<(), CoreError> {
    let (Some(&first_out), Some(&first_in)) = (outgoing.first(), incoming.first()) else {
        return Err(CoreError::InvariantViolation(
            "an exchange needs at least one entity on each side".to_string(),
        ));
    };
    store.with_bulk_depths(|store| {
        store.swap_in_place(container, first_out, first_in)?;
        for id in &outgoing[1..] {
            if !store.list_delete(container, *id)? {
                return Err(CoreError::InvariantViolation(format!(
                    "{id} is not owned by {container}"
                )));
            }
        }
        for id in &incoming[1..] {
            store.list_add(container, *id)?;
        }
        Ok(())
    })
}

pub(crate) fn insert_point(store: &mut ObjectStore, change: &PointChange) -> Result<(), EngineError> {
    match store.kind_of(change.target)? {
        ObjectKind::Line => {
            store.modify::<Line, _>(change.target, |line| {
                line.insert_vertex(change.index, change.point)
            })??;
        }
        ObjectKind::Spline => {
            store.modify::<Spline, _>(change.target, |spline| {
                let sfactor = change
                    .sfactor
                    .unwrap_or_else(|| spline.kind.default_sfactor());
                spline.insert(change.index, change.point, sfactor)
            })??;
        }
        kind => {
            return Err(EngineError::rejected(format!("{kind} objects have no point chain")));
        }
    }
    Ok(())
}

pub(crate) fn remove_point(
    store: &mut ObjectStore,
    target: EntityId,
    index: usize,
) -> Result<PointChange, EngineError> {
    let (point, sfactor) = match store.kind_of(target)? {
        ObjectKind::Line => (
            store.modify::<Line, _>(target, |line| line.remove_vertex(index))??,
            None,
        ),
        ObjectKind::Spline => {
            let (point, sfactor) =
                store.modify::<Spline, _>(target, |spline| spline.remove(index))??;
            (point, Some(sfactor))
        }
        kind => {
            return Err(EngineError::rejected(format!("{kind} objects have no point chain")));
        }
    };
    Ok(PointChange {
        target,
        index,
        point,
        sfactor,
    })
}

pub(crate) fn attach_arrow(store: &mut ObjectStore, change: &ArrowChange) -> Result<(), CoreError> {
    store.modify_arrows(change.target, |arrows| {
        *arrows.slot_mut(change.end) = Some(change.arrow);
    })
}

pub(crate) fn detach_arrow(
    store: &mut ObjectStore,
    target: EntityId,
    end: ArrowEnd,
) -> Result<ArrowChange, EngineError> {
    let taken = store.modify_arrows(target, |arrows| arrows.slot_mut(end).take())?;
    let arrow = taken.ok_or_else(|| EngineError::rejected(format!("{target} has no arrowhead there")))?;
    Ok(ArrowChange { target, end, arrow })
}

#[cfg(test)]
mod tests {
    use fig_core::entity::{Compound, Line, SplineKind, Style, Text};

    use super::*;

    fn line(store: &mut ObjectStore, depth: u16) -> EntityId {
        let line = Line::polyline([Point::new(0, 0), Point::new(10, 0)]).with_style(Style::at_depth(depth));
        store.insert(line).unwrap()
    }

    #[test]
    fn release_frees_only_what_the_record_keeps() {
        let mut store = ObjectStore::new();
        let kept = line(&mut store, 3);
        let dropped = line(&mut store, 4);

        let record = UndoRecord::Add {
            entities: vec![kept],
        };
        assert!(!record.holds(kept));
        record.release(&mut store).unwrap();
        assert!(store.contains(kept));

        let record = UndoRecord::Exchange {
            action: ActionKind::Edit,
            saved: vec![dropped],
            live: vec![kept],
        };
        assert!(record.holds(dropped));
        assert_eq!(record.action(), ActionKind::Edit);
        record.release(&mut store).unwrap();
        assert!(!store.contains(dropped));
        assert!(store.contains(kept));
    }

    #[test]
    fn releasing_a_broken_shell_keeps_its_former_members() {
        let mut store = ObjectStore::new();
        let root = store.root();
        let member = line(&mut store, 6);
        store.list_add(root, member).unwrap();
        let shell = store.insert(Compound::new()).unwrap();
        store.glue(root, shell, &[member]).unwrap();
        store.break_apart(root, shell).unwrap();

        UndoRecord::Break { compound: shell }
            .release(&mut store)
            .unwrap();
        assert!(!store.contains(shell));
        assert_eq!(store.parent(member), Some(root));
        store.verify_depths().unwrap();
    }

    #[test]
    fn exchange_replaces_one_with_two_and_back() {
        let mut store = ObjectStore::new();
        let root = store.root();
        let original = line(&mut store, 10);
        store.list_add(root, original).unwrap();
        let head = line(&mut store, 10);
        let tail = store.insert(Text::new(Point::new(1, 1), "tail").at_depth(12)).unwrap();

        exchange(&mut store, root, &[original], &[head, tail]).unwrap();
        assert!(store.is_detached(original));
        assert_eq!(store.depths().count(10), 1);
        assert_eq!(store.depths().count(12), 1);

        exchange(&mut store, root, &[head, tail], &[original]).unwrap();
        assert!(store.is_detached(head) && store.is_detached(tail));
        assert_eq!(store.depths().count(12), 0);
        store.verify_depths().unwrap();
    }

    #[test]
    fn spline_points_carry_their_shape_factor() {
        let mut store = ObjectStore::new();
        let spline = Spline::through(
            SplineKind::OpenInterp,
            [Point::new(0, 0), Point::new(5, 5), Point::new(10, 0)],
        );
        let id = store.insert(spline).unwrap();

        let removed = remove_point(&mut store, id, 1).unwrap();
        assert_eq!(removed.sfactor, Some(-1.0));
        assert_eq!(store.get_as::<Spline>(id).unwrap().len(), 2);

        insert_point(&mut store, &removed).unwrap();
        let spline = store.get_as::<Spline>(id).unwrap();
        assert_eq!(spline.points()[1], Point::new(5, 5));
        assert_eq!(spline.sfactors().len(), 3);
    }

    #[test]
    fn detaching_an_empty_arrow_slot_is_rejected() {
        let mut store = ObjectStore::new();
        let id = line(&mut store, 1);
        let change = ArrowChange {
            target: id,
            end: ArrowEnd::Forward,
            arrow: Arrow::default(),
        };
        attach_arrow(&mut store, &change).unwrap();
        assert_eq!(detach_arrow(&mut store, id, ArrowEnd::Forward).unwrap(), change);
        assert!(matches!(
            detach_arrow(&mut store, id, ArrowEnd::Forward),
            Err(EngineError::Rejected(_))
        ));
    }
}
