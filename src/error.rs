use log::{error, warn};
use rocket::{
    http::Status, response::Responder, serde::json::Json, tokio::task::JoinError, Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::QuestionId;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Question {0} not found")]
    NotFound(QuestionId),
    #[error("No questions have been created yet")]
    NoActiveQuestion,
    #[error("Invalid choice '{0}': must be 'A' or 'B'")]
    InvalidChoice(String),
    #[error("Question {0} does not exist")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Storage task failed: {0}")]
    Task(#[from] JoinError),
}

impl Error {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) | Self::NoActiveQuestion | Self::QuestionNotFound(_) => {
                Status::NotFound
            }
            Self::InvalidChoice(_) => Status::BadRequest,
            Self::Store(_) | Self::Task(_) => Status::InternalServerError,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let id = req.local_cache(RequestId::next);
        let detail = match self {
            err @ (Self::Store(_) | Self::Task(_)) => {
                error!("req{id} storage failure: {err}");
                "Internal storage error".to_string()
            }
            other => {
                warn!("req{id} {other}");
                other.to_string()
            }
        };
        (status, Json(ErrorBody { detail })).respond_to(req)
    }
}
