use chrono::Utc;
use log::info;

use crate::error::{Error, Result};
use crate::model::{NewQuestion, Question, QuestionId, QuestionPatch};
use crate::store::Store;

use super::blocking;

/// Question lifecycle: create, read, update, delete, and the derived
/// "active" question.
pub struct QuestionService {
    store: Store,
}

impl QuestionService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a question under the next unused ID.
    pub async fn create(&self, new: NewQuestion) -> Result<Question> {
        let question = blocking(&self.store, move |store| {
            Ok(store.insert_question(new, Utc::now())?)
        })
        .await?;
        info!("Created question {}", question.id);
        Ok(question)
    }

    pub async fn get(&self, id: QuestionId) -> Result<Question> {
        blocking(&self.store, move |store| {
            store.question(id)?.ok_or(Error::NotFound(id))
        })
        .await
    }

    /// All questions, newest first.
    pub async fn list_all(&self) -> Result<Vec<Question>> {
        let mut questions = blocking(&self.store, |store| Ok(store.questions()?)).await?;
        questions.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        Ok(questions)
    }

    /// Question texts in the same order as [`Self::list_all`].
    pub async fn list_question_texts(&self) -> Result<Vec<String>> {
        Ok(self.list_all().await?.into_iter().map(|q| q.text).collect())
    }

    /// Apply a partial update. Omitted fields keep their value.
    pub async fn update(&self, id: QuestionId, patch: &QuestionPatch) -> Result<Question> {
        let patch = patch.clone();
        let question = blocking(&self.store, move |store| {
            store.update_question(id, &patch)?.ok_or(Error::NotFound(id))
        })
        .await?;
        info!("Updated question {id}");
        Ok(question)
    }

    /// Delete a question along with all of its votes.
    pub async fn delete(&self, id: QuestionId) -> Result<()> {
        let deleted = blocking(&self.store, move |store| Ok(store.delete_question(id)?)).await?;
        if !deleted {
            return Err(Error::NotFound(id));
        }
        info!("Deleted question {id} and its votes");
        Ok(())
    }

    /// The most recently created question's ID, if there are any questions.
    pub async fn active_id(&self) -> Result<Option<QuestionId>> {
        blocking(&self.store, |store| Ok(store.latest_question_id()?)).await
    }

    pub async fn active(&self) -> Result<Question> {
        let id = self.active_id().await?.ok_or(Error::NoActiveQuestion)?;
        self.get(id).await
    }
}
