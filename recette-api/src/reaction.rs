use std::{collections::BTreeMap, fmt};

use uuid::Uuid;

use crate::{CommentId, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ReactionId(pub Uuid);

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Haha,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 4] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Haha,
        ReactionType::Angry,
    ];

    /// Map with every reaction type present and set to zero
    pub fn zeroed_counts() -> BTreeMap<ReactionType, usize> {
        ReactionType::ALL.iter().map(|t| (*t, 0)).collect()
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Haha => "haha",
            ReactionType::Angry => "angry",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub comment_id: CommentId,
    pub user_id: UserId,
    pub reaction_type: ReactionType,
    pub created_at: Time,
}

/// Answer to a "reactions for comment" request
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReactionsForComment {
    pub total_reaction: usize,
    pub reaction_counts: BTreeMap<ReactionType, usize>,
    pub reactions: Vec<Reaction>,
}

impl ReactionsForComment {
    pub fn from_reactions(reactions: Vec<Reaction>) -> ReactionsForComment {
        let mut reaction_counts = ReactionType::zeroed_counts();
        for r in reactions.iter() {
            *reaction_counts.entry(r.reaction_type).or_insert(0) += 1;
        }
        ReactionsForComment {
            total_reaction: reactions.len(),
            reaction_counts,
            reactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn reaction(reaction_type: ReactionType) -> Reaction {
        Reaction {
            id: ReactionId(Uuid::new_v4()),
            comment_id: CommentId::stub(),
            user_id: UserId(Uuid::new_v4()),
            reaction_type,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counts_every_type() {
        let res = ReactionsForComment::from_reactions(vec![
            reaction(ReactionType::Like),
            reaction(ReactionType::Like),
            reaction(ReactionType::Angry),
        ]);
        assert_eq!(res.total_reaction, 3);
        assert_eq!(res.reaction_counts[&ReactionType::Like], 2);
        assert_eq!(res.reaction_counts[&ReactionType::Love], 0);
        assert_eq!(res.reaction_counts[&ReactionType::Haha], 0);
        assert_eq!(res.reaction_counts[&ReactionType::Angry], 1);
    }

    #[test]
    fn empty_is_well_formed() {
        let res = ReactionsForComment::from_reactions(Vec::new());
        assert_eq!(res.total_reaction, 0);
        assert_eq!(res.reaction_counts.len(), ReactionType::ALL.len());
        assert!(res.reaction_counts.values().all(|c| *c == 0));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReactionType::Haha).unwrap(),
            "\"haha\""
        );
        assert_eq!(
            serde_json::from_str::<ReactionType>("\"angry\"").unwrap(),
            ReactionType::Angry
        );
    }
}
