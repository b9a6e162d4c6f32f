use std::collections::HashMap;

use uuid::Uuid;

use crate::{Comment, CommentId, Reaction, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct DishId(pub Uuid);

impl DishId {
    pub fn stub() -> DishId {
        DishId(STUB_UUID)
    }
}

/// Everything known about the comment section of one dish, as stored on disk
/// by `generate-test-data` and read back by `recette-ctl`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DishDump {
    pub dish_id: DishId,
    pub comments: Vec<Comment>,
    pub reactions: Vec<Reaction>,
}

impl DishDump {
    pub fn reactions_by_comment(&self) -> HashMap<CommentId, Vec<Reaction>> {
        let mut res: HashMap<CommentId, Vec<Reaction>> = HashMap::new();
        for r in self.reactions.iter() {
            res.entry(r.comment_id).or_default().push(r.clone());
        }
        res
    }
}
