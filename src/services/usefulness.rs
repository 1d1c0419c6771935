use std::sync::Arc;

use crate::{
    db::{Directory, VoteStore},
    error::AppResult,
    models::{EdgeOutcome, ReviewId, Usefulness, UserId},
};

use super::{require_review, require_user};

/// Like/dislike votes on reviews, folded into a signed usefulness score
#[derive(Clone)]
pub struct UsefulnessTally {
    directory: Arc<dyn Directory>,
    votes: Arc<dyn VoteStore>,
}

impl UsefulnessTally {
    pub fn new(directory: Arc<dyn Directory>, votes: Arc<dyn VoteStore>) -> Self {
        Self { directory, votes }
    }

    /// Casts or replaces the user's vote on the review
    #[tracing::instrument(skip_all, fields(%review_id, %user_id, is_like = is_like))]
    pub async fn vote(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        is_like: bool,
    ) -> AppResult<EdgeOutcome> {
        require_review(self.directory.as_ref(), review_id).await?;
        require_user(self.directory.as_ref(), user_id).await?;

        let outcome = self.votes.upsert_vote(review_id, user_id, is_like).await?;
        tracing::info!(?outcome, "Review vote stored");
        Ok(outcome)
    }

    /// Withdraws the user's vote, whichever way it went
    #[tracing::instrument(skip_all, fields(%review_id, %user_id))]
    pub async fn retract(&self, review_id: ReviewId, user_id: UserId) -> AppResult<EdgeOutcome> {
        require_review(self.directory.as_ref(), review_id).await?;
        require_user(self.directory.as_ref(), user_id).await?;

        let outcome = self.votes.delete_vote(review_id, user_id).await?;
        tracing::info!(?outcome, "Review vote retracted");
        Ok(outcome)
    }

    pub async fn score(&self, review_id: ReviewId) -> AppResult<Usefulness> {
        require_review(self.directory.as_ref(), review_id).await?;

        let (likes, dislikes) = self.votes.tally(review_id).await?;
        Ok(Usefulness::new(review_id, likes, dislikes))
    }
}
