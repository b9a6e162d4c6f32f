use chrono::{Duration, TimeZone, Utc};

use crate::api::{
    Comment, CommentId, DishId, Reaction, ReactionId, ReactionType, Time, UserId, Uuid,
};

pub fn t0() -> Time {
    Utc.with_ymd_and_hms(2022, 11, 2, 12, 0, 0).unwrap()
}

pub fn at(minutes: i64) -> Time {
    t0() + Duration::minutes(minutes)
}

pub fn cid(n: u128) -> CommentId {
    CommentId(Uuid::from_u128(n))
}

pub fn uid(n: u128) -> UserId {
    UserId(Uuid::from_u128(0x1000 + n))
}

pub fn dish() -> DishId {
    DishId(Uuid::from_u128(0xd154))
}

pub fn comment(id: u128, parent: Option<u128>, minutes: i64) -> Comment {
    Comment {
        id: cid(id),
        dish_id: dish(),
        author_id: uid(0),
        parent_id: parent.map(cid),
        content: format!("comment {id}"),
        created_at: at(minutes),
        updated_at: at(minutes),
        is_active: true,
    }
}

pub fn reaction(comment: u128, user: u128, reaction_type: ReactionType) -> Reaction {
    Reaction {
        id: ReactionId(Uuid::new_v4()),
        comment_id: cid(comment),
        user_id: uid(user),
        reaction_type,
        created_at: t0(),
    }
}
