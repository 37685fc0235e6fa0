use crate::error::{Error, Result};
use crate::model::{QuestionId, ResultSummary};
use crate::store::Store;

use super::blocking;

/// Computes vote tallies on demand. Nothing derived is ever stored.
pub struct ResultsAggregator {
    store: Store,
}

impl ResultsAggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Tally the given question, or the active question if `question_id` is `None`.
    pub async fn compute_results(&self, question_id: Option<QuestionId>) -> Result<ResultSummary> {
        blocking(&self.store, move |store| {
            let question_id = match question_id {
                Some(id) => id,
                None => store.latest_question_id()?.ok_or(Error::NoActiveQuestion)?,
            };
            let question = store
                .question(question_id)?
                .ok_or(Error::QuestionNotFound(question_id))?;
            let votes = store.votes_for(question_id)?;
            Ok(ResultSummary::tally(&question, &votes))
        })
        .await
    }
}
