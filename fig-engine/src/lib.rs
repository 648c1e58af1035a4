//! 编辑会话与单槽撤销引擎。
//!
//! [`editor::Editor`] 持有文档仓库、选中集与唯一的撤销槽位。每个结构性操作在提交前
//! 先校验前置条件并完成全部分配，再释放旧撤销记录所保管的图元，最后提交并写入新记录。
//! 撤销把记录改写为它的逆操作，因此连续两次撤销等于重做。

pub mod editor;
pub mod hooks;
pub mod operation;
pub mod reshape;
pub mod undo;

pub mod errors {
    use fig_core::errors::CoreError;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Core(#[from] CoreError),
        #[error("entity {0} is not a top-level object of the current figure")]
        NotInDocument(u64),
        #[error("operation rejected: {0}")]
        Rejected(String),
        #[error("operation names no entities")]
        EmptyOperation,
    }

    impl EngineError {
        pub(crate) fn rejected(message: impl Into<String>) -> Self {
            EngineError::Rejected(message.into())
        }
    }
}

pub mod prelude {
    pub use crate::editor::{Editor, EditorOptions};
    pub use crate::errors::EngineError;
    pub use crate::hooks::{EditorHooks, NoHooks};
    pub use crate::operation::{ActionKind, Operation};
    pub use crate::undo::{ArrowChange, PointChange, UndoOutcome, UndoRecord};
}
