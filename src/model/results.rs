use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{
    question::{Question, QuestionId},
    vote::{Choice, Vote},
};

/// Vote counts and percentages for one question, computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub question_id: QuestionId,
    #[serde(rename = "question")]
    pub question_text: String,
    #[serde(rename = "optionA")]
    pub option_a: String,
    #[serde(rename = "optionB")]
    pub option_b: String,
    #[serde(rename = "votes_A")]
    pub count_a: u64,
    #[serde(rename = "votes_B")]
    pub count_b: u64,
    pub total: u64,
    #[serde(rename = "percentage_A")]
    pub percentage_a: f64,
    #[serde(rename = "percentage_B")]
    pub percentage_b: f64,
}

impl ResultSummary {
    /// Tally the given votes for `question`. Votes for other questions are ignored.
    pub fn tally<'a>(question: &Question, votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        let (count_a, count_b) = votes
            .into_iter()
            .filter(|vote| vote.question_id == question.id)
            .fold((0, 0), |(a, b), vote| match vote.choice {
                Choice::A => (a + 1, b),
                Choice::B => (a, b + 1),
            });
        let total = count_a + count_b;
        let (percentage_a, percentage_b) = percentages(count_a, total);

        Self {
            question_id: question.id,
            question_text: question.text.clone(),
            option_a: question.option_a.clone(),
            option_b: question.option_b.clone(),
            count_a,
            count_b,
            total,
            percentage_a,
            percentage_b,
        }
    }
}

/// Percentages of A and B to one decimal place. Both are 0.0 without votes.
///
/// Each share is rounded on its own, half to even, in whole tenths. With two
/// options the exact tenths sum to 1000, so the rounded values still add up to
/// exactly 100.0.
pub fn percentages(count_a: u64, total: u64) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    let tenths_a = round_tenths(count_a, total);
    let tenths_b = round_tenths(total - count_a, total);
    (tenths_a as f64 / 10.0, tenths_b as f64 / 10.0)
}

/// `count / total` in tenths of a percent, rounded half to even.
fn round_tenths(count: u64, total: u64) -> u64 {
    let scaled = count * 1000;
    let (quotient, remainder) = (scaled / total, scaled % total);
    match (2 * remainder).cmp(&total) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => quotient + quotient % 2,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::question::NewQuestion;

    fn vote(question_id: QuestionId, choice: Choice) -> Vote {
        Vote {
            question_id,
            choice,
            user_name: None,
            voted_at: Utc::now(),
        }
    }

    #[test]
    fn two_to_one() {
        let question = Question::from_new(4, NewQuestion::example(), Utc::now());
        let votes = vec![
            vote(4, Choice::A),
            vote(4, Choice::A),
            vote(4, Choice::B),
            vote(3, Choice::B),
        ];

        let summary = ResultSummary::tally(&question, &votes);
        assert_eq!(summary.question_id, 4);
        assert_eq!(summary.question_text, "lunch?");
        assert_eq!(summary.option_a, "ramen");
        assert_eq!(summary.option_b, "sushi");
        assert_eq!(summary.count_a, 2);
        assert_eq!(summary.count_b, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.percentage_a, 66.7);
        assert_eq!(summary.percentage_b, 33.3);
    }

    #[test]
    fn no_votes() {
        let question = Question::from_new(1, NewQuestion::example(), Utc::now());
        let summary = ResultSummary::tally(&question, &Vec::new());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.percentage_a, 0.0);
        assert_eq!(summary.percentage_b, 0.0);
    }

    #[test]
    fn percentages_always_add_up() {
        for total in 1..=200 {
            for count_a in 0..=total {
                let (a, b) = percentages(count_a, total);
                assert_eq!(a + b, 100.0, "{count_a}/{total}");
                assert!((0.0..=100.0).contains(&a));
            }
        }
    }

    #[test]
    fn rounding() {
        assert_eq!(percentages(1, 3), (33.3, 66.7));
        assert_eq!(percentages(2, 3), (66.7, 33.3));
        assert_eq!(percentages(1, 8), (12.5, 87.5));
        assert_eq!(percentages(5, 5), (100.0, 0.0));
        assert_eq!(percentages(0, 7), (0.0, 100.0));
    }

    #[test]
    fn exact_ties_round_to_even() {
        // 6.25 / 93.75
        assert_eq!(percentages(1, 16), (6.2, 93.8));
        // 18.75 / 81.25
        assert_eq!(percentages(3, 16), (18.8, 81.2));
        // 31.25 / 68.75
        assert_eq!(percentages(5, 16), (31.2, 68.8));
        assert_eq!(percentages(15, 16), (93.8, 6.2));
    }
}
