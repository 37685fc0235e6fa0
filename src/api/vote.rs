use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{Ack, VoteRequest};
use crate::service::VoteService;

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

#[post("/api/vote", data = "<vote>", format = "json")]
async fn cast_vote(vote: Json<VoteRequest>, votes: VoteService) -> Result<Json<Ack>> {
    let VoteRequest {
        question_id,
        choice,
        user_name,
    } = vote.0;
    votes.record_vote(question_id, &choice, user_name).await?;
    Ok(Json(Ack::new("Vote recorded")))
}
