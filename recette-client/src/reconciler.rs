use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::{
    api::{
        Comment, CommentId, DishId, Error, Reaction, ReactionId, ReactionType, UserId, Uuid,
    },
    build_tree, CommentTree, Mutation, PhantomEntry, PhantomKey, ReactionChange, StateChange,
};

type Listener = Box<dyn FnMut(&StateChange) + Send>;

/// Comment and reaction state of one dish, as shown to one user.
///
/// Every mutation is applied locally right away as a phantom entry, and must
/// then be either confirmed with the server answer or rolled back. Callers
/// must not have two mutations in flight for the same target: a new mutation
/// overwrites the pending one, and its rollback only undoes the last call.
pub struct Reconciler {
    dish_id: DishId,
    author_id: UserId,

    /// Newest first, as the server sends them
    comments: Vec<Comment>,
    reactions: HashMap<CommentId, Vec<Reaction>>,

    phantoms: HashMap<PhantomKey, PhantomEntry>,
    listeners: Vec<Listener>,
}

impl Reconciler {
    pub fn new(dish_id: DishId, author_id: UserId) -> Reconciler {
        Reconciler {
            dish_id,
            author_id,
            comments: Vec::new(),
            reactions: HashMap::new(),
            phantoms: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn dish_id(&self) -> DishId {
        self.dish_id
    }

    pub fn author_id(&self) -> UserId {
        self.author_id
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn reactions(&self) -> &HashMap<CommentId, Vec<Reaction>> {
        &self.reactions
    }

    pub fn phantoms(&self) -> &HashMap<PhantomKey, PhantomEntry> {
        &self.phantoms
    }

    pub fn is_pending(&self, key: &PhantomKey) -> bool {
        self.phantoms.contains_key(key)
    }

    /// `listener` is called after every change to the state
    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn notify(&mut self, change: StateChange) {
        for l in self.listeners.iter_mut() {
            l(&change);
        }
    }

    /// Replace everything with authoritative server data, forgetting all
    /// pending mutations
    pub fn reset(&mut self, comments: Vec<Comment>, reactions: HashMap<CommentId, Vec<Reaction>>) {
        if !self.phantoms.is_empty() {
            tracing::debug!(
                num_phantoms = self.phantoms.len(),
                "dropping pending mutations on reset"
            );
        }
        self.comments = comments;
        self.reactions = reactions;
        self.phantoms.clear();
        self.notify(StateChange::Reset);
    }

    /// Renderable tree, with pending comments flagged
    pub fn tree(&self, viewer: Option<UserId>) -> CommentTree {
        let mut tree = build_tree(&self.comments, &self.reactions, viewer);
        let pending = self
            .phantoms
            .keys()
            .map(|k| match k {
                PhantomKey::Comment(c) => *c,
                PhantomKey::Reaction(c, _) => *c,
            })
            .collect::<HashSet<_>>();
        tree.mark_pending(&pending);
        tree
    }

    fn find_index(&self, id: &CommentId) -> Option<usize> {
        self.comments.iter().position(|c| c.id == *id)
    }

    fn pending_creation(&self, id: &CommentId) -> bool {
        matches!(
            self.phantoms.get(&PhantomKey::Comment(*id)),
            Some(PhantomEntry {
                mutation: Mutation::CreateComment,
                ..
            })
        )
    }

    /// Index of an active, server-confirmed comment
    fn confirmed_index(&self, id: &CommentId) -> Result<usize, Error> {
        let idx = self.find_index(id).ok_or(Error::CommentNotFound(*id))?;
        if !self.comments[idx].is_active {
            return Err(Error::CommentNotFound(*id));
        }
        if self.pending_creation(id) {
            return Err(Error::PendingComment(*id));
        }
        Ok(idx)
    }

    /// First deleted comment above `c`, whose subtree is hidden from the tree
    fn inactive_ancestor(&self, c: &Comment) -> Option<CommentId> {
        let by_id = self
            .comments
            .iter()
            .map(|other| (other.id, other))
            .collect::<HashMap<_, _>>();
        let mut visited = HashSet::new();
        let mut cur = c.parent_id;
        while let Some(id) = cur {
            if !visited.insert(id) {
                break;
            }
            let a = by_id.get(&id)?;
            if !a.is_active {
                return Some(id);
            }
            cur = a.parent_id;
        }
        None
    }

    fn record(&mut self, key: PhantomKey, mutation: Mutation) {
        let entry = PhantomEntry {
            mutation,
            applied_at: Utc::now(),
        };
        if let Some(previous) = self.phantoms.insert(key, entry) {
            tracing::warn!(
                ?key,
                ?previous,
                "overlapping optimistic mutations, only the last one can be rolled back"
            );
        }
        tracing::debug!(?key, "applied optimistic mutation");
        self.notify(StateChange::Applied(key));
    }

    /// Takes the pending entry for `key` if `matches` accepts it
    fn take(&mut self, key: PhantomKey, matches: impl Fn(&Mutation) -> bool) -> Option<Mutation> {
        let is_match = self
            .phantoms
            .get(&key)
            .map_or(false, |e| matches(&e.mutation));
        if !is_match {
            return None;
        }
        self.phantoms.remove(&key).map(|e| e.mutation)
    }

    pub fn add_comment_optimistic(
        &mut self,
        content: String,
        parent_id: Option<CommentId>,
    ) -> Result<CommentId, Error> {
        crate::api::validate_content(&content)?;
        if let Some(p) = parent_id {
            let parent = self
                .comments
                .iter()
                .find(|c| c.id == p)
                .ok_or(Error::ParentNotFound(p))?;
            if !parent.is_active {
                return Err(Error::InactiveParent(p));
            }
            if parent.dish_id != self.dish_id {
                return Err(Error::CrossDishParent {
                    parent: p,
                    parent_dish: parent.dish_id,
                    dish: self.dish_id,
                });
            }
            if self.pending_creation(&p) {
                return Err(Error::PendingComment(p));
            }
            if let Some(a) = self.inactive_ancestor(parent) {
                return Err(Error::InactiveParent(a));
            }
        }
        let now = Utc::now();
        let id = CommentId(Uuid::new_v4());
        self.comments.insert(
            0,
            Comment {
                id,
                dish_id: self.dish_id,
                author_id: self.author_id,
                parent_id,
                content,
                created_at: now,
                updated_at: now,
                is_active: true,
            },
        );
        self.record(PhantomKey::Comment(id), Mutation::CreateComment);
        Ok(id)
    }

    /// Returns false if `phantom` is not a pending comment creation
    pub fn confirm_comment(&mut self, phantom: CommentId, server: Comment) -> bool {
        let key = PhantomKey::Comment(phantom);
        if self
            .take(key, |m| matches!(m, Mutation::CreateComment))
            .is_none()
        {
            return false;
        }
        let server_id = server.id;
        if let Some(idx) = self.find_index(&phantom) {
            self.comments[idx] = server;
        }
        if let Some(mut reactions) = self.reactions.remove(&phantom) {
            for r in reactions.iter_mut() {
                r.comment_id = server_id;
            }
            self.reactions.insert(server_id, reactions);
        }
        self.notify(StateChange::Replaced {
            phantom,
            server: server_id,
        });
        true
    }

    /// Returns false if `phantom` is not a pending comment creation
    pub fn rollback_comment(&mut self, phantom: CommentId) -> bool {
        let key = PhantomKey::Comment(phantom);
        if self
            .take(key, |m| matches!(m, Mutation::CreateComment))
            .is_none()
        {
            return false;
        }
        self.comments.retain(|c| c.id != phantom);
        self.reactions.remove(&phantom);
        self.phantoms
            .retain(|k, _| !matches!(k, PhantomKey::Reaction(c, _) if *c == phantom));
        self.notify(StateChange::RolledBack(key));
        true
    }

    pub fn update_comment_optimistic(
        &mut self,
        id: CommentId,
        new_content: String,
    ) -> Result<(), Error> {
        crate::api::validate_content(&new_content)?;
        let idx = self.confirmed_index(&id)?;
        let comment = &mut self.comments[idx];
        let previous_content = std::mem::replace(&mut comment.content, new_content);
        let previous_updated_at = std::mem::replace(&mut comment.updated_at, Utc::now());
        self.record(
            PhantomKey::Comment(id),
            Mutation::EditComment {
                previous_content,
                previous_updated_at,
            },
        );
        Ok(())
    }

    /// Adopts the server version of the comment, which differs from the local
    /// one only if the server altered the content
    pub fn confirm_update(&mut self, id: CommentId, server: Comment) -> bool {
        if server.id != id {
            tracing::warn!(?id, server_id=?server.id, "server confirmed edit of another comment");
            return false;
        }
        let key = PhantomKey::Comment(id);
        if self
            .take(key, |m| matches!(m, Mutation::EditComment { .. }))
            .is_none()
        {
            return false;
        }
        if let Some(idx) = self.find_index(&id) {
            if self.comments[idx].content != server.content {
                tracing::debug!(?id, "server corrected edited content");
            }
            self.comments[idx] = server;
        }
        self.notify(StateChange::Confirmed(key));
        true
    }

    pub fn rollback_update(&mut self, id: CommentId) -> bool {
        let key = PhantomKey::Comment(id);
        let (previous_content, previous_updated_at) =
            match self.take(key, |m| matches!(m, Mutation::EditComment { .. })) {
                Some(Mutation::EditComment {
                    previous_content,
                    previous_updated_at,
                }) => (previous_content, previous_updated_at),
                _ => return false,
            };
        if let Some(idx) = self.find_index(&id) {
            self.comments[idx].content = previous_content;
            self.comments[idx].updated_at = previous_updated_at;
        }
        self.notify(StateChange::RolledBack(key));
        true
    }

    /// Hides the comment; its replies disappear from the tree with it
    pub fn delete_comment_optimistic(&mut self, id: CommentId) -> Result<(), Error> {
        let idx = self.confirmed_index(&id)?;
        self.comments[idx].is_active = false;
        self.record(PhantomKey::Comment(id), Mutation::DeleteComment);
        Ok(())
    }

    /// Mirrors the server-side cascade onto every local reply below `id`
    pub fn confirm_delete(&mut self, id: CommentId) -> bool {
        let key = PhantomKey::Comment(id);
        if self
            .take(key, |m| matches!(m, Mutation::DeleteComment))
            .is_none()
        {
            return false;
        }
        let mut deleted = HashSet::new();
        deleted.insert(id);
        loop {
            let mut changed = false;
            for c in self.comments.iter_mut() {
                if let Some(p) = c.parent_id {
                    if deleted.contains(&p) && deleted.insert(c.id) {
                        c.is_active = false;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        tracing::debug!(?id, num_deleted = deleted.len(), "confirmed comment deletion");
        self.notify(StateChange::Confirmed(key));
        true
    }

    pub fn rollback_delete(&mut self, id: CommentId) -> bool {
        let key = PhantomKey::Comment(id);
        if self
            .take(key, |m| matches!(m, Mutation::DeleteComment))
            .is_none()
        {
            return false;
        }
        if let Some(idx) = self.find_index(&id) {
            self.comments[idx].is_active = true;
        }
        self.notify(StateChange::RolledBack(key));
        true
    }

    pub fn viewer_reaction(&self, comment: &CommentId, viewer: &UserId) -> Option<&Reaction> {
        self.reactions
            .get(comment)
            .and_then(|l| l.iter().find(|r| r.user_id == *viewer))
    }

    /// Sets `viewer`'s reaction on `comment`, `None` meaning no reaction.
    /// Requesting the reaction already in place toggles it off.
    pub fn set_reaction_optimistic(
        &mut self,
        comment: CommentId,
        viewer: UserId,
        reaction_type: Option<ReactionType>,
    ) -> Result<ReactionChange, Error> {
        self.confirmed_index(&comment)?;
        let previous = self.viewer_reaction(&comment, &viewer).cloned();
        let change = match (previous.as_ref().map(|r| r.reaction_type), reaction_type) {
            (None, None) => ReactionChange::Unchanged,
            (Some(_), None) => ReactionChange::Removed,
            (Some(p), Some(t)) if p == t => ReactionChange::Removed,
            (Some(_), Some(t)) => ReactionChange::Changed(t),
            (None, Some(t)) => ReactionChange::Added(t),
        };
        let new = match change {
            ReactionChange::Unchanged => return Ok(change),
            ReactionChange::Removed => None,
            ReactionChange::Changed(t) => previous.clone().map(|mut r| {
                r.reaction_type = t;
                r
            }),
            ReactionChange::Added(reaction_type) => Some(Reaction {
                id: ReactionId(Uuid::new_v4()),
                comment_id: comment,
                user_id: viewer,
                reaction_type,
                created_at: Utc::now(),
            }),
        };
        self.put_reaction(comment, viewer, new);
        self.record(
            PhantomKey::Reaction(comment, viewer),
            Mutation::SetReaction { previous },
        );
        Ok(change)
    }

    /// Replaces the local reaction with the server one, `None` confirming a
    /// removal
    pub fn confirm_reaction(
        &mut self,
        comment: CommentId,
        viewer: UserId,
        server: Option<Reaction>,
    ) -> bool {
        let key = PhantomKey::Reaction(comment, viewer);
        if self
            .take(key, |m| matches!(m, Mutation::SetReaction { .. }))
            .is_none()
        {
            return false;
        }
        let server = server.filter(|r| {
            let matches = r.comment_id == comment && r.user_id == viewer;
            if !matches {
                tracing::warn!(?key, reaction=?r, "server confirmed a reaction for another target");
            }
            matches
        });
        self.put_reaction(comment, viewer, server);
        self.notify(StateChange::Confirmed(key));
        true
    }

    pub fn rollback_reaction(&mut self, comment: CommentId, viewer: UserId) -> bool {
        let key = PhantomKey::Reaction(comment, viewer);
        let previous = match self.take(key, |m| matches!(m, Mutation::SetReaction { .. })) {
            Some(Mutation::SetReaction { previous }) => previous,
            _ => return false,
        };
        self.put_reaction(comment, viewer, previous);
        self.notify(StateChange::RolledBack(key));
        true
    }

    /// Makes `reaction` the only reaction of `viewer` on `comment`, keeping
    /// its position in the list if there already was one
    fn put_reaction(&mut self, comment: CommentId, viewer: UserId, reaction: Option<Reaction>) {
        let list = self.reactions.entry(comment).or_default();
        let pos = list.iter().position(|r| r.user_id == viewer);
        list.retain(|r| r.user_id != viewer);
        if let Some(r) = reaction {
            match pos {
                Some(pos) => list.insert(pos, r),
                None => list.push(r),
            }
        }
        if list.is_empty() {
            self.reactions.remove(&comment);
        }
    }
}
