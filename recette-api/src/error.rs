use crate::{CommentId, DishId};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Service unavailable")]
    Unavailable,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Comment not found {0:?}")]
    CommentNotFound(CommentId),

    #[error("Parent comment not found {0:?}")]
    ParentNotFound(CommentId),

    #[error("Parent comment {0:?} was deleted")]
    InactiveParent(CommentId),

    #[error("Parent comment {parent:?} belongs to dish {parent_dish:?}, not {dish:?}")]
    CrossDishParent {
        parent: CommentId,
        parent_dish: DishId,
        dish: DishId,
    },

    #[error("Comment {0:?} is not confirmed by the server yet")]
    PendingComment(CommentId),

    #[error("Comment content must not be empty")]
    EmptyContent,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),
}

impl Error {
    /// Whether the failure may have happened after the server already applied
    /// the request, in which case local state can only be trusted again after
    /// a re-fetch
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Unavailable)
    }
}
