use std::fmt;

use fig_core::entity::{Arrow, ArrowEnd, EntityId};
use fig_core::geometry::Point;

/// 撤销槽位当前记录的动作种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    None,
    Add,
    Delete,
    Move,
    Edit,
    Glue,
    Break,
    Load,
    Scale,
    AddPoint,
    DeletePoint,
    AddArrowHead,
    DeleteArrowHead,
    Convert,
    OpenClose,
    JoinSplit,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::None => "none",
            ActionKind::Add => "add",
            ActionKind::Delete => "delete",
            ActionKind::Move => "move",
            ActionKind::Edit => "edit",
            ActionKind::Glue => "glue",
            ActionKind::Break => "break",
            ActionKind::Load => "load",
            ActionKind::Scale => "scale",
            ActionKind::AddPoint => "add point",
            ActionKind::DeletePoint => "delete point",
            ActionKind::AddArrowHead => "add arrowhead",
            ActionKind::DeleteArrowHead => "delete arrowhead",
            ActionKind::Convert => "convert",
            ActionKind::OpenClose => "open/close",
            ActionKind::JoinSplit => "join/split",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 交给 [`crate::editor::Editor::apply`] 的结构性修改。
///
/// 除 `Add`、`Edit` 的替换图元与 `Load` 的新图形（必须是游离图元）外，
/// 操作对象都必须是当前文档根下的顶层图元。
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
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
    /// 以 `fix` 为不动点，把 `from` 拉伸到 `to`。
    Scale {
        target: EntityId,
        fix: Point,
        from: Point,
        to: Point,
    },
    Edit {
        target: EntityId,
        replacement: EntityId,
    },
    Glue {
        entities: Vec<EntityId>,
    },
    Break {
        compound: EntityId,
    },
    Load {
        figure: EntityId,
        name: String,
    },
    /// 样条未给出形状因子时使用该类型的默认值。
    AddPoint {
        target: EntityId,
        index: usize,
        point: Point,
        sfactor: Option<f64>,
    },
    DeletePoint {
        target: EntityId,
        index: usize,
    },
    AddArrowHead {
        target: EntityId,
        end: ArrowEnd,
        arrow: Arrow,
    },
    DeleteArrowHead {
        target: EntityId,
        end: ArrowEnd,
    },
    Convert {
        target: EntityId,
    },
    OpenClose {
        target: EntityId,
    },
    Join {
        first: EntityId,
        second: EntityId,
    },
    Split {
        target: EntityId,
        index: usize,
    },
}

impl Operation {
    pub fn action(&self) -> ActionKind {
        match self {
            Operation::Add { .. } => ActionKind::Add,
            Operation::Delete { .. } => ActionKind::Delete,
            Operation::Move { .. } => ActionKind::Move,
            Operation::Scale { .. } => ActionKind::Scale,
            Operation::Edit { .. } => ActionKind::Edit,
            Operation::Glue { .. } => ActionKind::Glue,
            Operation::Break { .. } => ActionKind::Break,
            Operation::Load { .. } => ActionKind::Load,
            Operation::AddPoint { .. } => ActionKind::AddPoint,
            Operation::DeletePoint { .. } => ActionKind::DeletePoint,
            Operation::AddArrowHead { .. } => ActionKind::AddArrowHead,
            Operation::DeleteArrowHead { .. } => ActionKind::DeleteArrowHead,
            Operation::Convert { .. } => ActionKind::Convert,
            Operation::OpenClose { .. } => ActionKind::OpenClose,
            Operation::Join { .. } | Operation::Split { .. } => ActionKind::JoinSplit,
        }
    }

    /// 操作直接引用的全部图元。
    pub fn operands(&self) -> Vec<EntityId> {
        match self {
            Operation::Add { entities }
            | Operation::Delete { entities }
            | Operation::Move { entities, .. }
            | Operation::Glue { entities } => entities.clone(),
            Operation::Edit {
                target,
                replacement,
            } => vec![*target, *replacement],
            Operation::Join { first, second } => vec![*first, *second],
            Operation::Break { compound } => vec![*compound],
            Operation::Load { figure, .. } => vec![*figure],
            Operation::Scale { target, .. }
            | Operation::AddPoint { target, .. }
            | Operation::DeletePoint { target, .. }
            | Operation::AddArrowHead { target, .. }
            | Operation::DeleteArrowHead { target, .. }
            | Operation::Convert { target }
            | Operation::OpenClose { target }
            | Operation::Split { target, .. } => vec![*target],
        }
    }
}
