use async_trait::async_trait;

use crate::{
    Comment, CommentId, DishId, Error, NewComment, Reaction, ReactionType, ReactionsForComment,
    UserId,
};

/// The remote comment service, acting on behalf of `current_user`
#[async_trait]
pub trait Backend {
    fn current_user(&self) -> UserId;

    /// All comments of the dish, replies included, newest first
    async fn fetch_comments(&mut self, dish: DishId) -> Result<Vec<Comment>, Error>;
    async fn fetch_reactions(&mut self, comment: CommentId) -> Result<ReactionsForComment, Error>;

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment, Error>;
    async fn update_comment(&mut self, comment: CommentId, content: String)
        -> Result<Comment, Error>;
    /// Also deletes every reply below `comment`
    async fn delete_comment(&mut self, comment: CommentId) -> Result<(), Error>;

    async fn add_reaction(
        &mut self,
        comment: CommentId,
        reaction_type: ReactionType,
    ) -> Result<Reaction, Error>;
    async fn update_reaction(
        &mut self,
        comment: CommentId,
        reaction_type: ReactionType,
    ) -> Result<Reaction, Error>;
    async fn remove_reaction(&mut self, comment: CommentId) -> Result<(), Error>;
}
