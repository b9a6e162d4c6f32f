use std::collections::HashMap;

use crate::{
    api::{Backend, CommentId, DishId, Error, NewComment, Reaction, ReactionType, UserId},
    audit, CommentTree, PhantomKey, ReactionChange, Reconciler, StateChange,
};

/// Open comment view of one dish, keeping the local state in sync with the
/// backend
pub struct CommentSession<B> {
    backend: B,
    reconciler: Reconciler,
}

impl<B: Backend> CommentSession<B> {
    pub async fn load(backend: B, dish_id: DishId) -> Result<CommentSession<B>, Error> {
        let author = backend.current_user();
        let mut res = CommentSession {
            backend,
            reconciler: Reconciler::new(dish_id, author),
        };
        res.refresh().await?;
        Ok(res)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn viewer(&self) -> UserId {
        self.backend.current_user()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + Send + 'static) {
        self.reconciler.subscribe(listener)
    }

    pub fn tree(&self) -> CommentTree {
        self.reconciler.tree(Some(self.viewer()))
    }

    /// Replaces the local state with what the backend currently has
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let dish_id = self.reconciler.dish_id();
        let comments = self.backend.fetch_comments(dish_id).await?;
        let mut reactions = HashMap::<CommentId, Vec<Reaction>>::new();
        for c in comments.iter().filter(|c| c.is_active) {
            let r = self.backend.fetch_reactions(c.id).await?;
            if !r.reactions.is_empty() {
                reactions.insert(c.id, r.reactions);
            }
        }
        for a in audit(&comments, reactions.values().flatten()) {
            tracing::warn!(dish=?dish_id, anomaly=%a, "backend sent inconsistent data");
        }
        tracing::debug!(dish=?dish_id, num_comments = comments.len(), "refreshed comments");
        self.reconciler.reset(comments, reactions);
        Ok(())
    }

    /// Reports a failed mutation that was already rolled back, and re-syncs
    /// with the backend in case it did apply the mutation anyway
    async fn fail(&mut self, key: PhantomKey, error: Error) -> Error {
        if error.is_transport() {
            tracing::warn!(
                ?key,
                ?error,
                "no answer from backend, rolled back mutation it may have applied"
            );
        } else {
            tracing::warn!(?key, ?error, "backend refused mutation, rolled back");
        }
        self.reconciler.notify(StateChange::Failed {
            key,
            error: error.clone(),
        });
        if let Err(e) = self.refresh().await {
            tracing::error!(
                ?key,
                error=?e,
                "failed re-fetching comments after a failed mutation"
            );
        }
        error
    }

    /// Returns the id the backend assigned to the new comment
    pub async fn add_comment(
        &mut self,
        content: String,
        parent_id: Option<CommentId>,
    ) -> Result<CommentId, Error> {
        let phantom = self
            .reconciler
            .add_comment_optimistic(content.clone(), parent_id)?;
        let new = NewComment {
            dish_id: self.reconciler.dish_id(),
            content,
            parent_id,
        };
        match self.backend.create_comment(new).await {
            Ok(c) => {
                let id = c.id;
                self.reconciler.confirm_comment(phantom, c);
                Ok(id)
            }
            Err(e) => {
                self.reconciler.rollback_comment(phantom);
                Err(self.fail(PhantomKey::Comment(phantom), e).await)
            }
        }
    }

    pub async fn edit_comment(&mut self, id: CommentId, content: String) -> Result<(), Error> {
        self.reconciler
            .update_comment_optimistic(id, content.clone())?;
        match self.backend.update_comment(id, content).await {
            Ok(c) => {
                self.reconciler.confirm_update(id, c);
                Ok(())
            }
            Err(e) => {
                self.reconciler.rollback_update(id);
                Err(self.fail(PhantomKey::Comment(id), e).await)
            }
        }
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> Result<(), Error> {
        self.reconciler.delete_comment_optimistic(id)?;
        match self.backend.delete_comment(id).await {
            Ok(()) => {
                self.reconciler.confirm_delete(id);
                Ok(())
            }
            Err(e) => {
                self.reconciler.rollback_delete(id);
                Err(self.fail(PhantomKey::Comment(id), e).await)
            }
        }
    }

    /// Sets the viewer's reaction, toggling it off if it is already the
    /// current one
    pub async fn set_reaction(
        &mut self,
        comment: CommentId,
        reaction_type: Option<ReactionType>,
    ) -> Result<ReactionChange, Error> {
        let viewer = self.viewer();
        let change = self
            .reconciler
            .set_reaction_optimistic(comment, viewer, reaction_type)?;
        let res = match change {
            ReactionChange::Unchanged => return Ok(change),
            ReactionChange::Added(t) => self.backend.add_reaction(comment, t).await.map(Some),
            ReactionChange::Changed(t) => {
                self.backend.update_reaction(comment, t).await.map(Some)
            }
            ReactionChange::Removed => {
                self.backend.remove_reaction(comment).await.map(|()| None)
            }
        };
        match res {
            Ok(server) => {
                self.reconciler.confirm_reaction(comment, viewer, server);
                Ok(change)
            }
            Err(e) => {
                self.reconciler.rollback_reaction(comment, viewer);
                Err(self.fail(PhantomKey::Reaction(comment, viewer), e).await)
            }
        }
    }
}
