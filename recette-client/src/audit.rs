use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::api::{Comment, CommentId, Reaction, ReactionId, UserId};

/// Data-model violation found in comments or reactions coming from outside
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Anomaly {
    DuplicateId(CommentId),
    EmptyContent(CommentId),
    Orphan {
        comment: CommentId,
        missing_parent: CommentId,
    },
    InactiveParent {
        comment: CommentId,
        parent: CommentId,
    },
    CrossDishParent {
        comment: CommentId,
        parent: CommentId,
    },
    Cycle(CommentId),
    DuplicateReaction {
        comment: CommentId,
        user: UserId,
    },
    DanglingReaction {
        reaction: ReactionId,
        comment: CommentId,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DuplicateId(c) => write!(f, "comment id {} is used more than once", c.0),
            Anomaly::EmptyContent(c) => write!(f, "comment {} has invalid content", c.0),
            Anomaly::Orphan {
                comment,
                missing_parent,
            } => write!(
                f,
                "comment {} replies to unknown comment {}",
                comment.0, missing_parent.0
            ),
            Anomaly::InactiveParent { comment, parent } => write!(
                f,
                "comment {} replies to deleted comment {}",
                comment.0, parent.0
            ),
            Anomaly::CrossDishParent { comment, parent } => write!(
                f,
                "comment {} replies to comment {} of another dish",
                comment.0, parent.0
            ),
            Anomaly::Cycle(c) => write!(f, "comment {} is its own ancestor", c.0),
            Anomaly::DuplicateReaction { comment, user } => write!(
                f,
                "user {} has several reactions on comment {}",
                user.0, comment.0
            ),
            Anomaly::DanglingReaction { reaction, comment } => write!(
                f,
                "reaction {} is attached to unknown comment {}",
                reaction.0, comment.0
            ),
        }
    }
}

/// Lists every anomaly, in input order
pub fn audit<'a, R>(comments: &[Comment], reactions: R) -> Vec<Anomaly>
where
    R: IntoIterator<Item = &'a Reaction>,
{
    let mut res = Vec::new();

    let mut by_id = HashMap::with_capacity(comments.len());
    for c in comments {
        if by_id.insert(c.id, c).is_some() {
            res.push(Anomaly::DuplicateId(c.id));
        }
    }

    for c in comments {
        if c.is_active && crate::api::validate_content(&c.content).is_err() {
            res.push(Anomaly::EmptyContent(c.id));
        }
        let parent_id = match c.parent_id {
            None => continue,
            Some(p) => p,
        };
        match by_id.get(&parent_id) {
            None => res.push(Anomaly::Orphan {
                comment: c.id,
                missing_parent: parent_id,
            }),
            Some(p) if p.dish_id != c.dish_id => res.push(Anomaly::CrossDishParent {
                comment: c.id,
                parent: parent_id,
            }),
            Some(p) if c.is_active && !p.is_active => res.push(Anomaly::InactiveParent {
                comment: c.id,
                parent: parent_id,
            }),
            Some(_) => (),
        }
        if is_in_cycle(c, &by_id) {
            res.push(Anomaly::Cycle(c.id));
        }
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for r in reactions {
        if !by_id.contains_key(&r.comment_id) {
            res.push(Anomaly::DanglingReaction {
                reaction: r.id,
                comment: r.comment_id,
            });
        }
        let key = (r.comment_id, r.user_id);
        if !seen.insert(key) && reported.insert(key) {
            res.push(Anomaly::DuplicateReaction {
                comment: r.comment_id,
                user: r.user_id,
            });
        }
    }

    res
}

fn is_in_cycle(c: &Comment, by_id: &HashMap<CommentId, &Comment>) -> bool {
    let mut visited = HashSet::new();
    let mut cur = c.parent_id;
    while let Some(id) = cur {
        if id == c.id {
            return true;
        }
        if !visited.insert(id) {
            // Cycle above us, not through us
            return false;
        }
        cur = by_id.get(&id).and_then(|p| p.parent_id);
    }
    false
}
