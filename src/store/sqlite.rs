use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{
    params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, OptionalExtension, Row, ToSql,
};

use crate::model::{
    question::default_questions, Choice, NewQuestion, Question, QuestionId, QuestionPatch, Vote,
};

use super::{PollStore, Result, StorageKind, StoreError};

/// `AUTOINCREMENT` keeps a high-water mark in `sqlite_sequence`, so deleted
/// question IDs are never handed out again.
const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS questions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        question    TEXT NOT NULL,
        option_a    TEXT NOT NULL,
        option_b    TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS votes (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        question_id  INTEGER NOT NULL REFERENCES questions (id),
        choice       TEXT NOT NULL CHECK (choice IN ('A', 'B')),
        user_name    TEXT,
        voted_at     TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS votes_by_question ON votes (question_id);
";

const QUESTION_COLUMNS: &str = "id, question, option_a, option_b, created_at";
const VOTE_COLUMNS: &str = "question_id, choice, user_name, voted_at";

/// Questions and votes in two tables of a single SQLite file.
///
/// All access goes through one connection behind a mutex. Multi-statement
/// operations run in a transaction.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub const FILE_NAME: &'static str = "polls.sqlite3";

    /// Open the database at `path`, creating the file and schema if needed.
    /// A newly created database is seeded with the default questions if `seed` is set.
    pub fn open(path: impl AsRef<Path>, seed: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fresh = !path.exists();

        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        let store = Self {
            path,
            conn: Mutex::new(conn),
        };

        if fresh && seed {
            info!("Created {}, seeding default questions", store.path.display());
            let now = Utc::now();
            let mut conn = store.conn("seed")?;
            let tx = conn.transaction()?;
            for new in default_questions() {
                insert_question(&tx, new, now)?;
            }
            tx.commit()?;
        } else {
            debug!("Opened {}", store.path.display());
        }

        Ok(store)
    }

    fn conn(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned(operation))
    }
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get("id")?,
        text: row.get("question")?,
        option_a: row.get("option_a")?,
        option_b: row.get("option_b")?,
        created_at: row.get("created_at")?,
    })
}

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        question_id: row.get("question_id")?,
        choice: row.get("choice")?,
        user_name: row.get("user_name")?,
        voted_at: row.get("voted_at")?,
    })
}

fn insert_question(conn: &Connection, new: NewQuestion, created_at: DateTime<Utc>) -> Result<Question> {
    let sql = format!(
        "INSERT INTO questions (question, option_a, option_b, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING {QUESTION_COLUMNS}"
    );
    let question = conn.query_row(
        &sql,
        params![new.text, new.option_a, new.option_b, created_at],
        question_from_row,
    )?;
    Ok(question)
}

impl ToSql for Choice {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Choice {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

impl PollStore for SqliteStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Sqlite
    }

    fn questions(&self) -> Result<Vec<Question>> {
        let conn = self.conn("questions")?;
        let mut stmt = conn.prepare(&format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id"))?;
        let questions = stmt
            .query_map([], question_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    fn question(&self, id: QuestionId) -> Result<Option<Question>> {
        let conn = self.conn("question")?;
        let question = conn
            .query_row(
                &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1"),
                params![id],
                question_from_row,
            )
            .optional()?;
        Ok(question)
    }

    fn latest_question_id(&self) -> Result<Option<QuestionId>> {
        let conn = self.conn("latest_question_id")?;
        let id = conn.query_row("SELECT MAX(id) FROM questions", [], |row| row.get(0))?;
        Ok(id)
    }

    fn insert_question(&self, new: NewQuestion, created_at: DateTime<Utc>) -> Result<Question> {
        let conn = self.conn("insert_question")?;
        insert_question(&conn, new, created_at)
    }

    fn update_question(&self, id: QuestionId, patch: &QuestionPatch) -> Result<Option<Question>> {
        let conn = self.conn("update_question")?;
        let sql = format!(
            "UPDATE questions
             SET question = COALESCE(?2, question),
                 option_a = COALESCE(?3, option_a),
                 option_b = COALESCE(?4, option_b)
             WHERE id = ?1
             RETURNING {QUESTION_COLUMNS}"
        );
        let question = conn
            .query_row(
                &sql,
                params![id, patch.text, patch.option_a, patch.option_b],
                question_from_row,
            )
            .optional()?;
        Ok(question)
    }

    fn delete_question(&self, id: QuestionId) -> Result<bool> {
        let mut conn = self.conn("delete_question")?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM votes WHERE question_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        if deleted == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    fn insert_vote(&self, vote: &Vote) -> Result<bool> {
        let conn = self.conn("insert_vote")?;
        let inserted = conn.execute(
            "INSERT INTO votes (question_id, choice, user_name, voted_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE EXISTS (SELECT 1 FROM questions WHERE id = ?1)",
            params![vote.question_id, vote.choice, vote.user_name, vote.voted_at],
        )?;
        Ok(inserted == 1)
    }

    fn votes_for(&self, question_id: QuestionId) -> Result<Vec<Vote>> {
        let conn = self.conn("votes_for")?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE question_id = ?1 ORDER BY id"
        ))?;
        let votes = stmt
            .query_map(params![question_id], vote_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }
}
