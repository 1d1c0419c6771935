use std::sync::Arc;

use crate::{
    db::{Directory, FriendStore, Journal},
    error::{AppError, AppResult},
    models::{EdgeOutcome, EventType, NewFeedEvent, Operation, User, UserId},
};

use super::require_user;

/// Directed follow relationships between users.
///
/// Following is one-way: `follow(a, b)` never creates `b -> a`.
#[derive(Clone)]
pub struct FriendGraph {
    directory: Arc<dyn Directory>,
    friends: Arc<dyn FriendStore>,
}

impl FriendGraph {
    pub fn new(directory: Arc<dyn Directory>, friends: Arc<dyn FriendStore>) -> Self {
        Self { directory, friends }
    }

    /// Rejects self-edges, then makes sure both users exist
    async fn check_pair(&self, user_id: UserId, friend_id: UserId) -> AppResult<()> {
        if user_id == friend_id {
            tracing::warn!("Rejected self-friendship");
            return Err(AppError::Validation(format!(
                "user {} cannot befriend themselves",
                user_id
            )));
        }

        require_user(self.directory.as_ref(), user_id).await?;
        require_user(self.directory.as_ref(), friend_id).await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(%user_id, %friend_id))]
    pub async fn follow(&self, user_id: UserId, friend_id: UserId) -> AppResult<EdgeOutcome> {
        self.check_pair(user_id, friend_id).await?;

        let event = NewFeedEvent::new(user_id, EventType::Friend, Operation::Add, friend_id);
        let outcome = self
            .friends
            .follow(user_id, friend_id, Journal::Always(event))
            .await?;

        tracing::info!(?outcome, "Friend added");
        Ok(outcome)
    }

    /// Drops the directed edge. The removal is journaled even when there was
    /// no edge to drop.
    #[tracing::instrument(skip_all, fields(%user_id, %friend_id))]
    pub async fn unfollow(&self, user_id: UserId, friend_id: UserId) -> AppResult<EdgeOutcome> {
        self.check_pair(user_id, friend_id).await?;

        let event = NewFeedEvent::new(user_id, EventType::Friend, Operation::Remove, friend_id);
        let outcome = self
            .friends
            .unfollow(user_id, friend_id, Journal::Always(event))
            .await?;

        tracing::info!(?outcome, "Friend removed");
        Ok(outcome)
    }

    /// Users the given user follows, in id order
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn friends_of(&self, user_id: UserId) -> AppResult<Vec<User>> {
        require_user(self.directory.as_ref(), user_id).await?;

        let ids = self.friends.followees(user_id).await?;
        tracing::debug!(count = ids.len(), "Friends listed");

        self.directory.find_users(&ids).await
    }

    /// Users followed by both `user_id` and `other_id`
    #[tracing::instrument(skip_all, fields(%user_id, %other_id))]
    pub async fn common_friends(&self, user_id: UserId, other_id: UserId) -> AppResult<Vec<User>> {
        require_user(self.directory.as_ref(), user_id).await?;
        require_user(self.directory.as_ref(), other_id).await?;

        let ids = self.friends.common_followees(user_id, other_id).await?;
        tracing::debug!(count = ids.len(), "Common friends found");

        self.directory.find_users(&ids).await
    }
}
