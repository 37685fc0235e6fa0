use chrono::Utc;
use log::debug;

use crate::error::{Error, Result};
use crate::model::{Choice, QuestionId, Vote};
use crate::store::Store;

use super::blocking;

/// Records votes against existing questions.
pub struct VoteService {
    store: Store,
}

impl VoteService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a vote for `choice` ("A" or "B") on the given question.
    ///
    /// The choice is checked before the question, so an invalid choice is
    /// always reported as such. The store checks the question and appends the
    /// vote in one step. There is no limit on votes per user.
    pub async fn record_vote(
        &self,
        question_id: QuestionId,
        choice: &str,
        user_name: Option<String>,
    ) -> Result<()> {
        let choice: Choice = choice
            .parse()
            .map_err(|_| Error::InvalidChoice(choice.to_string()))?;

        let vote = Vote {
            question_id,
            choice,
            user_name,
            voted_at: Utc::now(),
        };
        let recorded = blocking(&self.store, move |store| Ok(store.insert_vote(&vote)?)).await?;
        if !recorded {
            return Err(Error::QuestionNotFound(question_id));
        }
        debug!("Recorded vote {choice} for question {question_id}");
        Ok(())
    }
}
