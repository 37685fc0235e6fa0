//! Persistence for questions and votes.
//!
//! Two backends implement [`PollStore`] with the same contract:
//!
//! - [`JsonStore`]: whole-collection JSON files, each replaced atomically.
//! - [`SqliteStore`]: a single SQLite file with `questions` and `votes` tables.
//!
//! Both hand out question IDs from a high-water mark, so an ID is never
//! reused even after its question is deleted.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{NewQuestion, Question, QuestionId, QuestionPatch, Vote};

mod json;
mod sqlite;

pub use json::JsonStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupt data in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("Store lock poisoned during {0}")]
    Poisoned(&'static str),
    #[error("No question IDs left to assign")]
    IdsExhausted,
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }
}

/// Durable storage of the question and vote collections.
///
/// Implementations must not cache anything between calls; every call
/// observes the persisted state.
pub trait PollStore: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> StorageKind;

    /// All questions, in no particular order.
    fn questions(&self) -> Result<Vec<Question>>;

    /// The question with the given ID, if any.
    fn question(&self, id: QuestionId) -> Result<Option<Question>>;

    /// The highest question ID currently present.
    fn latest_question_id(&self) -> Result<Option<QuestionId>>;

    /// Assign the next ID to `new`, persist it, and return the stored record.
    fn insert_question(&self, new: NewQuestion, created_at: DateTime<Utc>) -> Result<Question>;

    /// Apply `patch` to the question with the given ID and return the result,
    /// or `None` if there is no such question.
    fn update_question(&self, id: QuestionId, patch: &QuestionPatch) -> Result<Option<Question>>;

    /// Delete the question and every vote referencing it.
    /// Returns false if there was no such question.
    fn delete_question(&self, id: QuestionId) -> Result<bool>;

    /// Append a vote if its question exists, checked atomically with the write.
    /// Returns false, persisting nothing, if there is no such question.
    fn insert_vote(&self, vote: &Vote) -> Result<bool>;

    /// All votes referencing the given question.
    fn votes_for(&self, question_id: QuestionId) -> Result<Vec<Vote>>;
}

/// A shared handle on the configured store. This is the managed state that
/// request guards build services from.
pub type Store = Arc<dyn PollStore>;

/// Storage backend selection.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Flat JSON files.
    #[default]
    Json,
    /// A single SQLite database file.
    Sqlite,
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Open (creating if needed) a store of the given kind under `data_dir`.
/// A store created from nothing is seeded with the default questions if `seed` is set.
pub fn open(kind: StorageKind, data_dir: &Path, seed: bool) -> Result<Store> {
    std::fs::create_dir_all(data_dir).map_err(StoreError::io(data_dir))?;
    let store: Store = match kind {
        StorageKind::Json => Arc::new(JsonStore::open(data_dir, seed)?),
        StorageKind::Sqlite => {
            let path = data_dir.join(SqliteStore::FILE_NAME);
            Arc::new(SqliteStore::open(path, seed)?)
        }
    };
    Ok(store)
}

/// Contract tests run against both backends.
#[cfg(test)]
mod tests {
    use crate::model::{Choice, NewQuestion, QuestionPatch, Vote};

    use super::*;

    fn vote(question_id: QuestionId, choice: Choice) -> Vote {
        Vote {
            question_id,
            choice,
            user_name: Some("tester".to_string()),
            voted_at: Utc::now(),
        }
    }

    async fn seeded_contents(store: Store) {
        let mut questions = store.questions().unwrap();
        questions.sort_by_key(|q| q.id);
        let ids = questions.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.latest_question_id().unwrap(), Some(3));
        assert_eq!(questions[0], store.question(1).unwrap().unwrap());
    }

    #[backend_test]
    async fn seeded_json(store: Store) {
        assert_eq!(store.kind(), StorageKind::Json);
        seeded_contents(store).await;
    }

    #[backend_test(sqlite)]
    async fn seeded_sqlite(store: Store) {
        assert_eq!(store.kind(), StorageKind::Sqlite);
        seeded_contents(store).await;
    }

    async fn ids_never_reused(store: Store) {
        assert!(store.questions().unwrap().is_empty());
        assert_eq!(store.latest_question_id().unwrap(), None);

        let first = store.insert_question(NewQuestion::example(), Utc::now()).unwrap();
        let second = store.insert_question(NewQuestion::example2(), Utc::now()).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        // Delete the newest question; its ID must not come back.
        assert!(store.delete_question(2).unwrap());
        assert_eq!(store.latest_question_id().unwrap(), Some(1));
        let third = store.insert_question(NewQuestion::example2(), Utc::now()).unwrap();
        assert_eq!(third.id, 3);

        // Same when the collection is emptied entirely.
        assert!(store.delete_question(1).unwrap());
        assert!(store.delete_question(3).unwrap());
        assert_eq!(store.latest_question_id().unwrap(), None);
        let fourth = store.insert_question(NewQuestion::example(), Utc::now()).unwrap();
        assert_eq!(fourth.id, 4);
    }

    #[backend_test(empty)]
    async fn ids_never_reused_json(store: Store) {
        ids_never_reused(store).await;
    }

    #[backend_test(sqlite, empty)]
    async fn ids_never_reused_sqlite(store: Store) {
        ids_never_reused(store).await;
    }

    async fn update_and_cascade(store: Store) {
        let question = store.insert_question(NewQuestion::example(), Utc::now()).unwrap();
        let other = store.insert_question(NewQuestion::example2(), Utc::now()).unwrap();

        // Partial update.
        let patch = QuestionPatch {
            option_b: Some("udon".to_string()),
            ..Default::default()
        };
        let updated = store.update_question(question.id, &patch).unwrap().unwrap();
        assert_eq!(updated.text, question.text);
        assert_eq!(updated.option_a, question.option_a);
        assert_eq!(updated.option_b, "udon");
        assert_eq!(updated.created_at, question.created_at);
        assert_eq!(store.question(question.id).unwrap().unwrap(), updated);
        assert!(store.update_question(99, &patch).unwrap().is_none());

        // Votes are kept per question.
        assert!(store.insert_vote(&vote(question.id, Choice::A)).unwrap());
        assert!(store.insert_vote(&vote(question.id, Choice::B)).unwrap());
        assert!(store.insert_vote(&vote(other.id, Choice::B)).unwrap());
        let votes = store.votes_for(question.id).unwrap();
        assert_eq!(votes.len(), 2);
        assert!(votes.iter().all(|v| v.question_id == question.id));
        assert_eq!(votes[0].user_name.as_deref(), Some("tester"));

        // Deleting cascades to the votes, and only those votes.
        assert!(store.delete_question(question.id).unwrap());
        assert!(!store.delete_question(question.id).unwrap());
        assert!(store.question(question.id).unwrap().is_none());
        assert!(store.votes_for(question.id).unwrap().is_empty());
        assert_eq!(store.votes_for(other.id).unwrap().len(), 1);
    }

    #[backend_test(empty)]
    async fn update_and_cascade_json(store: Store) {
        update_and_cascade(store).await;
    }

    #[backend_test(sqlite, empty)]
    async fn update_and_cascade_sqlite(store: Store) {
        update_and_cascade(store).await;
    }

    async fn votes_only_for_existing_questions(store: Store) {
        assert!(!store.insert_vote(&vote(42, Choice::A)).unwrap());
        assert!(store.votes_for(42).unwrap().is_empty());

        assert!(store.delete_question(1).unwrap());
        assert!(!store.insert_vote(&vote(1, Choice::B)).unwrap());
        assert!(store.votes_for(1).unwrap().is_empty());
    }

    #[backend_test]
    async fn votes_only_for_existing_questions_json(store: Store) {
        votes_only_for_existing_questions(store).await;
    }

    #[backend_test(sqlite)]
    async fn votes_only_for_existing_questions_sqlite(store: Store) {
        votes_only_for_existing_questions(store).await;
    }

    /// Votes racing a delete either land before it (and are cascaded) or are
    /// refused, so none can outlive the question.
    async fn votes_racing_delete(store: Store) {
        let voters = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.insert_vote(&vote(2, Choice::A)).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        assert!(store.delete_question(2).unwrap());
        for voter in voters {
            voter.join().unwrap();
        }

        assert!(store.question(2).unwrap().is_none());
        assert!(store.votes_for(2).unwrap().is_empty());
        assert!(!store.insert_vote(&vote(2, Choice::B)).unwrap());
    }

    #[backend_test]
    async fn votes_racing_delete_json(store: Store) {
        votes_racing_delete(store).await;
    }

    #[backend_test(sqlite)]
    async fn votes_racing_delete_sqlite(store: Store) {
        votes_racing_delete(store).await;
    }

    #[test]
    fn storage_kind_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            storage: StorageKind,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"storage": "sqlite"}"#).unwrap();
        assert_eq!(parsed.storage, StorageKind::Sqlite);
        assert_eq!(StorageKind::default().to_string(), "json");
    }
}
