use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rocket::serde::json::serde_json;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::model::{
    question::default_questions, NewQuestion, Question, QuestionId, QuestionPatch, Vote,
};

use super::{PollStore, Result, StorageKind, StoreError};

/// A file's contents, which may have failed to parse.
type Parsed<T> = std::result::Result<T, serde_json::Error>;

/// The question ID high-water mark, persisted next to the collections so that
/// IDs are not handed out twice even after the highest question is deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Counter {
    next: QuestionId,
}

/// Questions and votes kept as two JSON arrays, one file each.
///
/// Every mutation loads the whole collection, modifies it, and replaces the
/// file atomically. An in-process lock serialises whole operations, so two
/// requests cannot interleave their read-modify-write cycles.
pub struct JsonStore {
    questions_path: PathBuf,
    votes_path: PathBuf,
    counter_path: PathBuf,
    seed: bool,
    lock: Mutex<()>,
}

impl JsonStore {
    pub const QUESTIONS_FILE: &'static str = "questions.json";
    pub const VOTES_FILE: &'static str = "votes.json";
    pub const COUNTER_FILE: &'static str = "counter.json";

    /// Open the store in `data_dir`, which must already exist.
    ///
    /// If `seed` is set, a missing or unreadable questions file is replaced by
    /// the default questions. Otherwise a missing file is an empty collection
    /// and an unreadable one is an error.
    pub fn open(data_dir: &Path, seed: bool) -> Result<Self> {
        let store = Self {
            questions_path: data_dir.join(Self::QUESTIONS_FILE),
            votes_path: data_dir.join(Self::VOTES_FILE),
            counter_path: data_dir.join(Self::COUNTER_FILE),
            seed,
            lock: Mutex::new(()),
        };

        // Load once so that a fresh directory is seeded (or a corrupt one is
        // reported) at startup rather than on the first request.
        {
            let _guard = store.lock("open")?;
            let questions = store.load_questions()?;
            debug!(
                "Opened {} with {} questions",
                store.questions_path.display(),
                questions.len()
            );
        }

        Ok(store)
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| StoreError::Poisoned(operation))
    }

    /// Read and parse a file. `Ok(None)` if it does not exist.
    fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<Parsed<T>>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path)(e)),
        }
    }

    /// Replace a file with the serialised value, via a temporary file and a
    /// rename so readers never see a partial write.
    fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, raw).map_err(StoreError::io(&tmp_path))?;
        fs::rename(&tmp_path, path).map_err(StoreError::io(path))
    }

    fn load_questions(&self) -> Result<Vec<Question>> {
        match Self::read(&self.questions_path)? {
            Some(Ok(questions)) => Ok(questions),
            Some(Err(e)) if self.seed => {
                warn!(
                    "Unreadable {} ({e}), reseeding default questions",
                    self.questions_path.display()
                );
                self.reseed()
            }
            Some(Err(source)) => Err(StoreError::Corrupt {
                path: self.questions_path.clone(),
                source,
            }),
            None if self.seed => {
                info!("No {} yet, seeding default questions", self.questions_path.display());
                self.reseed()
            }
            None => Ok(Vec::new()),
        }
    }

    fn load_votes(&self) -> Result<Vec<Vote>> {
        match Self::read(&self.votes_path)? {
            Some(Ok(votes)) => Ok(votes),
            Some(Err(e)) => {
                warn!("Unreadable {} ({e}), treating as empty", self.votes_path.display());
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    fn load_counter(&self) -> Result<Option<Counter>> {
        match Self::read(&self.counter_path)? {
            Some(Ok(counter)) => Ok(Some(counter)),
            Some(Err(e)) => {
                warn!("Unreadable {} ({e}), ignoring", self.counter_path.display());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// The next free ID: above every existing question and at least the
    /// persisted high-water mark.
    fn next_id(&self, questions: &[Question]) -> Result<QuestionId> {
        let above_existing = match questions.iter().map(|q| q.id).max() {
            Some(max) => max.checked_add(1).ok_or(StoreError::IdsExhausted)?,
            None => 1,
        };
        let high_water = self.load_counter()?.map_or(1, |c| c.next);
        Ok(above_existing.max(high_water))
    }

    /// Persist a question under a fresh ID, bumping the counter first so a
    /// crash in between can only skip an ID, never repeat one.
    fn append(
        &self,
        questions: &mut Vec<Question>,
        new: NewQuestion,
        created_at: DateTime<Utc>,
    ) -> Result<Question> {
        let id = self.next_id(questions)?;
        let next = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        Self::write(&self.counter_path, &Counter { next })?;
        let question = Question::from_new(id, new, created_at);
        questions.push(question.clone());
        Self::write(&self.questions_path, questions.as_slice())?;
        Ok(question)
    }

    fn reseed(&self) -> Result<Vec<Question>> {
        let now = Utc::now();
        let mut questions = Vec::new();
        for new in default_questions() {
            self.append(&mut questions, new, now)?;
        }
        Ok(questions)
    }
}

impl PollStore for JsonStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Json
    }

    fn questions(&self) -> Result<Vec<Question>> {
        let _guard = self.lock("questions")?;
        self.load_questions()
    }

    fn question(&self, id: QuestionId) -> Result<Option<Question>> {
        let _guard = self.lock("question")?;
        Ok(self.load_questions()?.into_iter().find(|q| q.id == id))
    }

    fn latest_question_id(&self) -> Result<Option<QuestionId>> {
        let _guard = self.lock("latest_question_id")?;
        Ok(self.load_questions()?.iter().map(|q| q.id).max())
    }

    fn insert_question(&self, new: NewQuestion, created_at: DateTime<Utc>) -> Result<Question> {
        let _guard = self.lock("insert_question")?;
        let mut questions = self.load_questions()?;
        self.append(&mut questions, new, created_at)
    }

    fn update_question(&self, id: QuestionId, patch: &QuestionPatch) -> Result<Option<Question>> {
        let _guard = self.lock("update_question")?;
        let mut questions = self.load_questions()?;
        let updated = match questions.iter_mut().find(|q| q.id == id) {
            Some(question) => {
                question.apply(patch);
                question.clone()
            }
            None => return Ok(None),
        };
        Self::write(&self.questions_path, &questions)?;
        Ok(Some(updated))
    }

    fn delete_question(&self, id: QuestionId) -> Result<bool> {
        let _guard = self.lock("delete_question")?;
        let mut questions = self.load_questions()?;
        let before = questions.len();
        questions.retain(|q| q.id != id);
        if questions.len() == before {
            return Ok(false);
        }

        // Votes go first: if we stop in between, the question survives
        // without votes rather than leaving orphaned votes behind.
        let mut votes = self.load_votes()?;
        votes.retain(|v| v.question_id != id);
        Self::write(&self.votes_path, &votes)?;
        Self::write(&self.questions_path, &questions)?;
        Ok(true)
    }

    fn insert_vote(&self, vote: &Vote) -> Result<bool> {
        let _guard = self.lock("insert_vote")?;
        if !self.load_questions()?.iter().any(|q| q.id == vote.question_id) {
            return Ok(false);
        }
        let mut votes = self.load_votes()?;
        votes.push(vote.clone());
        Self::write(&self.votes_path, &votes)?;
        Ok(true)
    }

    fn votes_for(&self, question_id: QuestionId) -> Result<Vec<Vote>> {
        let _guard = self.lock("votes_for")?;
        let mut votes = self.load_votes()?;
        votes.retain(|v| v.question_id == question_id);
        Ok(votes)
    }
}
