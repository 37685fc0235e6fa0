use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{Ack, NewQuestion, Question, QuestionId, QuestionPatch};
use crate::service::QuestionService;

pub fn routes() -> Vec<Route> {
    routes![
        active_question,
        get_question,
        list_questions,
        create_question,
        update_question,
        delete_question,
        history,
    ]
}

#[get("/api/question")]
async fn active_question(questions: QuestionService) -> Result<Json<Question>> {
    Ok(Json(questions.active().await?))
}

#[get("/api/question/<id>")]
async fn get_question(id: QuestionId, questions: QuestionService) -> Result<Json<Question>> {
    Ok(Json(questions.get(id).await?))
}

#[get("/api/questions")]
async fn list_questions(questions: QuestionService) -> Result<Json<Vec<Question>>> {
    Ok(Json(questions.list_all().await?))
}

#[post("/api/question", data = "<new_question>", format = "json")]
async fn create_question(
    new_question: Json<NewQuestion>,
    questions: QuestionService,
) -> Result<Json<Question>> {
    Ok(Json(questions.create(new_question.0).await?))
}

#[put("/api/question/<id>", data = "<patch>", format = "json")]
async fn update_question(
    id: QuestionId,
    patch: Json<QuestionPatch>,
    questions: QuestionService,
) -> Result<Json<Question>> {
    Ok(Json(questions.update(id, &patch).await?))
}

#[delete("/api/question/<id>")]
async fn delete_question(id: QuestionId, questions: QuestionService) -> Result<Json<Ack>> {
    questions.delete(id).await?;
    Ok(Json(Ack::new(format!("Deleted question {id}"))))
}

#[get("/api/history")]
async fn history(questions: QuestionService) -> Result<Json<Vec<String>>> {
    Ok(Json(questions.list_question_texts().await?))
}
