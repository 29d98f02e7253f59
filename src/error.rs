//! Error types for the layout engine.

use thiserror::Error;

use crate::layout::ParentAlignment;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("system root is not set on the box container")]
    SystemRootMissing,

    #[error("layout strategy `{0}` is not registered")]
    StrategyNotFound(String),

    #[error("visual tree must have exactly one root, found {0}")]
    MultipleRoots(usize),

    #[error("the root of the visual tree is not the system root")]
    RootMismatch,

    #[error("{strategy} layout does not support {alignment:?} parent alignment")]
    UnsupportedAlignment {
        strategy: &'static str,
        alignment: ParentAlignment,
    },

    #[error("max_groups must be greater than zero")]
    InvalidGroupCount,

    #[error("layout strategy applied at level zero; only the system root may sit there")]
    StrategyOnRoot,

    #[error("boundary pool exhausted; layout level stack exceeded the tree depth")]
    LevelStackOverflow,

    #[error("node has no effective layout strategy; pre-processing did not run")]
    StrategyUnresolved,

    #[error("cannot lay out a branch whose affects_layout flag is cleared")]
    HiddenBranch,
}

pub type Result<T> = std::result::Result<T, LayoutError>;
