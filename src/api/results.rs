use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{QuestionId, ResultSummary};
use crate::service::ResultsAggregator;

pub fn routes() -> Vec<Route> {
    routes![current_results, question_results]
}

/// Results for `question_id`, or for the active question if it is omitted.
#[get("/api/results?<question_id>")]
async fn current_results(
    question_id: Option<QuestionId>,
    results: ResultsAggregator,
) -> Result<Json<ResultSummary>> {
    Ok(Json(results.compute_results(question_id).await?))
}

#[get("/api/question/<question_id>/results")]
async fn question_results(
    question_id: QuestionId,
    results: ResultsAggregator,
) -> Result<Json<ResultSummary>> {
    Ok(Json(results.compute_results(Some(question_id)).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use super::*;

    #[backend_test]
    async fn lunch_results(client: Client) {
        let response = client
            .post("/api/question")
            .header(ContentType::JSON)
            .body(json!({"q": "lunch?", "a": "ramen", "b": "sushi"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        for choice in ["A", "A", "B"] {
            let response = client
                .post("/api/vote")
                .header(ContentType::JSON)
                .body(json!({"question_id": 4, "choice": choice}).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
        }

        let response = client.get(uri!(current_results(Some(4)))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let raw = response.into_string().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "question_id": 4,
                "question": "lunch?",
                "optionA": "ramen",
                "optionB": "sushi",
                "votes_A": 2,
                "votes_B": 1,
                "total": 3,
                "percentage_A": 66.7,
                "percentage_B": 33.3,
            })
        );

        // Without an ID, the active question is used.
        let response = client.get("/api/results").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_string().await.unwrap(), raw);

        let response = client.get(uri!(question_results(4))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_string().await.unwrap(), raw);
    }

    #[backend_test(sqlite)]
    async fn no_votes_yet(client: Client) {
        let response = client.get(uri!(question_results(2))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summary: ResultSummary = response.into_json().await.unwrap();
        assert_eq!(summary.question_id, 2);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.percentage_a, 0.0);
        assert_eq!(summary.percentage_b, 0.0);
    }

    #[backend_test]
    async fn deleted_question(client: Client) {
        let response = client
            .post("/api/vote")
            .header(ContentType::JSON)
            .body(json!({"question_id": 3, "choice": "B"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client.delete("/api/question/3").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let response = client.get(uri!(question_results(3))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let response = client.get(uri!(current_results(Some(3)))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        // The active question falls back to the next newest.
        let summary: ResultSummary = client
            .get("/api/results")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(summary.question_id, 2);
    }

    #[backend_test(sqlite, empty)]
    async fn no_questions(client: Client) {
        let response = client.get("/api/results").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let response = client.get(uri!(question_results(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
