use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Our question IDs are integers.
pub type QuestionId = u32;

/// A binary-choice question, as stored and as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique ID, never reused after deletion.
    pub id: QuestionId,
    /// Question text.
    #[serde(rename = "q")]
    pub text: String,
    /// Label of option A.
    #[serde(rename = "a")]
    pub option_a: String,
    /// Label of option B.
    #[serde(rename = "b")]
    pub option_b: String,
    /// Creation time. Records written without one load as the Unix epoch.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Build the stored form of a new question under the given ID.
    pub fn from_new(id: QuestionId, new: NewQuestion, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: new.text,
            option_a: new.option_a,
            option_b: new.option_b,
            created_at,
        }
    }

    /// Apply a partial update in place. `id` and `created_at` are untouched.
    pub fn apply(&mut self, patch: &QuestionPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(option_a) = &patch.option_a {
            self.option_a = option_a.clone();
        }
        if let Some(option_b) = &patch.option_b {
            self.option_b = option_b.clone();
        }
    }
}

/// A question that has not been assigned an ID yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(rename = "a")]
    pub option_a: String,
    #[serde(rename = "b")]
    pub option_b: String,
}

impl NewQuestion {
    pub fn new(text: impl Into<String>, option_a: impl Into<String>, option_b: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            option_a: option_a.into(),
            option_b: option_b.into(),
        }
    }
}

/// A partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPatch {
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub option_a: Option<String>,
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub option_b: Option<String>,
}

/// The questions a fresh store is seeded with.
pub fn default_questions() -> Vec<NewQuestion> {
    vec![
        NewQuestion::new(
            "Which would you eat for the rest of your life?",
            "Premium sushi",
            "Ultimate yakiniku",
        ),
        NewQuestion::new("Where would you travel?", "To the past", "To the future"),
        NewQuestion::new("Where would you rather live?", "A frozen land", "A scorching land"),
    ]
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl NewQuestion {
        pub fn example() -> Self {
            Self::new("lunch?", "ramen", "sushi")
        }

        pub fn example2() -> Self {
            Self::new("Cats or dogs?", "Cats", "Dogs")
        }
    }
}
