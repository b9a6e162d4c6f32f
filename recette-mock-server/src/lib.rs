use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use recette_api::{
    Backend, Comment, CommentId, DishDump, DishId, Error, NewComment, Reaction, ReactionId,
    ReactionType, ReactionsForComment, Time, UserId, Uuid,
};
use tokio::sync::Mutex;

/// In-memory comment service shared by all the clients it hands out
#[derive(Clone, Default)]
pub struct MockServer(Arc<Mutex<Store>>);

#[derive(Debug, Default)]
struct Store {
    /// Created and loaded comments, in the order they arrived
    comments: Vec<Comment>,
    reactions: Vec<Reaction>,
    last_time: Option<Time>,

    fail_next: usize,
    lose_next_response: bool,
}

impl Store {
    /// Strictly increasing, so that creation order is also time order
    fn now(&mut self) -> Time {
        let mut now = Utc::now();
        if let Some(last) = self.last_time {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_time = Some(now);
        now
    }

    fn check_available(&mut self) -> Result<(), Error> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            tracing::debug!(remaining = self.fail_next, "injecting failure");
            return Err(Error::Unavailable);
        }
        Ok(())
    }

    /// Called once a mutation was applied
    fn respond<T>(&mut self, res: T) -> Result<T, Error> {
        if self.lose_next_response {
            self.lose_next_response = false;
            tracing::debug!("dropping response of applied mutation");
            return Err(Error::Unavailable);
        }
        Ok(res)
    }

    fn active(&mut self, id: CommentId) -> Result<&mut Comment, Error> {
        self.comments
            .iter_mut()
            .find(|c| c.id == id && c.is_active)
            .ok_or(Error::CommentNotFound(id))
    }

    fn owned(&mut self, id: CommentId, user: UserId) -> Result<&mut Comment, Error> {
        let c = self.active(id)?;
        if c.author_id != user {
            return Err(Error::PermissionDenied);
        }
        Ok(c)
    }

    fn create_comment(&mut self, user: UserId, new: NewComment) -> Result<Comment, Error> {
        new.validate()?;
        if let Some(p) = new.parent_id {
            let parent = self
                .comments
                .iter()
                .find(|c| c.id == p)
                .ok_or(Error::ParentNotFound(p))?;
            if !parent.is_active {
                return Err(Error::InactiveParent(p));
            }
            if parent.dish_id != new.dish_id {
                return Err(Error::CrossDishParent {
                    parent: p,
                    parent_dish: parent.dish_id,
                    dish: new.dish_id,
                });
            }
        }
        let now = self.now();
        let c = Comment {
            id: CommentId(Uuid::new_v4()),
            dish_id: new.dish_id,
            author_id: user,
            parent_id: new.parent_id,
            content: new.content,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        self.comments.push(c.clone());
        Ok(c)
    }

    fn update_comment(
        &mut self,
        user: UserId,
        id: CommentId,
        content: String,
    ) -> Result<Comment, Error> {
        recette_api::validate_content(&content)?;
        let now = self.now();
        let c = self.owned(id, user)?;
        c.content = content;
        c.updated_at = now;
        Ok(c.clone())
    }

    fn delete_comment(&mut self, user: UserId, id: CommentId) -> Result<(), Error> {
        self.owned(id, user)?;
        let mut children: HashMap<CommentId, Vec<usize>> = HashMap::new();
        for (i, c) in self.comments.iter().enumerate() {
            if let Some(p) = c.parent_id {
                children.entry(p).or_default().push(i);
            }
        }
        // Loaded dumps can list replies before their parents, so follow the
        // children index rather than the storage order
        let mut deleted = HashSet::new();
        let mut stack = self
            .comments
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id == id)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        while let Some(i) = stack.pop() {
            let c = &mut self.comments[i];
            c.is_active = false;
            if deleted.insert(c.id) {
                stack.extend(children.get(&c.id).into_iter().flatten().copied());
            }
        }
        tracing::debug!(?id, num_deleted = deleted.len(), "deleted comment");
        Ok(())
    }

    fn set_reaction(
        &mut self,
        user: UserId,
        comment: CommentId,
        reaction_type: ReactionType,
    ) -> Result<Reaction, Error> {
        self.active(comment)?;
        if let Some(r) = self
            .reactions
            .iter_mut()
            .find(|r| r.comment_id == comment && r.user_id == user)
        {
            r.reaction_type = reaction_type;
            return Ok(r.clone());
        }
        let r = Reaction {
            id: ReactionId(Uuid::new_v4()),
            comment_id: comment,
            user_id: user,
            reaction_type,
            created_at: self.now(),
        };
        self.reactions.push(r.clone());
        Ok(r)
    }

    fn remove_reaction(&mut self, user: UserId, comment: CommentId) -> Result<(), Error> {
        self.active(comment)?;
        self.reactions
            .retain(|r| !(r.comment_id == comment && r.user_id == user));
        Ok(())
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn client(&self, user: UserId) -> MockClient {
        MockClient {
            server: self.clone(),
            user,
        }
    }

    /// Adds the content of `dump` to the stored data, as is
    pub async fn load(&self, dump: DishDump) {
        let mut s = self.0.lock().await;
        s.comments.extend(dump.comments);
        s.reactions.extend(dump.reactions);
    }

    /// The next `n` calls fail without touching the stored data
    pub async fn fail_next(&self, n: usize) {
        self.0.lock().await.fail_next = n;
    }

    /// The next mutation is applied, but its caller is told it failed
    pub async fn lose_next_response(&self) {
        self.0.lock().await.lose_next_response = true;
    }

    pub async fn dump(&self, dish_id: DishId) -> DishDump {
        let s = self.0.lock().await;
        let comments = s
            .comments
            .iter()
            .filter(|c| c.dish_id == dish_id)
            .cloned()
            .collect::<Vec<_>>();
        let ids = comments.iter().map(|c| c.id).collect::<HashSet<_>>();
        let reactions = s
            .reactions
            .iter()
            .filter(|r| ids.contains(&r.comment_id))
            .cloned()
            .collect();
        DishDump {
            dish_id,
            comments,
            reactions,
        }
    }
}

/// Connection to a `MockServer` on behalf of one user
#[derive(Clone)]
pub struct MockClient {
    server: MockServer,
    user: UserId,
}

#[async_trait]
impl Backend for MockClient {
    fn current_user(&self) -> UserId {
        self.user
    }

    async fn fetch_comments(&mut self, dish: DishId) -> Result<Vec<Comment>, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        let mut res = s
            .comments
            .iter()
            .filter(|c| c.dish_id == dish)
            .cloned()
            .collect::<Vec<_>>();
        res.reverse();
        Ok(res)
    }

    async fn fetch_reactions(&mut self, comment: CommentId) -> Result<ReactionsForComment, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        s.active(comment)?;
        let reactions = s
            .reactions
            .iter()
            .filter(|r| r.comment_id == comment)
            .cloned()
            .collect();
        Ok(ReactionsForComment::from_reactions(reactions))
    }

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        let res = s.create_comment(self.user, comment)?;
        s.respond(res)
    }

    async fn update_comment(
        &mut self,
        comment: CommentId,
        content: String,
    ) -> Result<Comment, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        let res = s.update_comment(self.user, comment, content)?;
        s.respond(res)
    }

    async fn delete_comment(&mut self, comment: CommentId) -> Result<(), Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        s.delete_comment(self.user, comment)?;
        s.respond(())
    }

    async fn add_reaction(
        &mut self,
        comment: CommentId,
        reaction_type: ReactionType,
    ) -> Result<Reaction, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        let res = s.set_reaction(self.user, comment, reaction_type)?;
        s.respond(res)
    }

    async fn update_reaction(
        &mut self,
        comment: CommentId,
        reaction_type: ReactionType,
    ) -> Result<Reaction, Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        let res = s.set_reaction(self.user, comment, reaction_type)?;
        s.respond(res)
    }

    async fn remove_reaction(&mut self, comment: CommentId) -> Result<(), Error> {
        let mut s = self.server.0.lock().await;
        s.check_available()?;
        s.remove_reaction(self.user, comment)?;
        s.respond(())
    }
}
