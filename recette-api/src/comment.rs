use uuid::Uuid;

use crate::{DishId, Error, Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub dish_id: DishId,
    pub author_id: UserId,

    /// None for top-level comments
    pub parent_id: Option<CommentId>,

    pub content: String,
    pub created_at: Time,
    pub updated_at: Time,

    /// Soft-delete flag, inactive comments are never rendered
    pub is_active: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub dish_id: DishId,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    // See comments on other `validate` functions throughout recette-api
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_content(&self.content)
    }
}
