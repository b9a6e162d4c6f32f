use crate::api::{CommentId, Error, Reaction, ReactionType, Time, UserId};

/// What a phantom entry stands in for. There is at most one pending mutation
/// per key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PhantomKey {
    Comment(CommentId),
    Reaction(CommentId, UserId),
}

/// A local mutation the server did not confirm yet, along with what is needed
/// to undo it
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhantomEntry {
    pub mutation: Mutation,
    pub applied_at: Time,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
    /// The comment only exists locally, under a client-generated id
    CreateComment,
    EditComment {
        previous_content: String,
        previous_updated_at: Time,
    },
    DeleteComment,
    SetReaction {
        previous: Option<Reaction>,
    },
}

/// Remote call that must follow a local reaction change
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReactionChange {
    Added(ReactionType),
    Changed(ReactionType),
    Removed,
    /// Nothing changed locally, no call needed
    Unchanged,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StateChange {
    /// The whole state was replaced with server data
    Reset,
    Applied(PhantomKey),
    Confirmed(PhantomKey),
    /// A phantom comment got its server-assigned id
    Replaced {
        phantom: CommentId,
        server: CommentId,
    },
    RolledBack(PhantomKey),
    /// The server refused or did not answer, the caller should tell the user
    Failed { key: PhantomKey, error: Error },
}
