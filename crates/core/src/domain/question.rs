use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conditions::SpecialCondition;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuestion {
    pub id: String,
    pub category: SpecialCondition,
    pub question: String,
    pub impact: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub question: UserQuestion,
    pub answer: bool,
    #[serde(default)]
    pub raw_input: Option<String>,
    pub answered_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(question: UserQuestion, answer: bool, raw_input: Option<String>) -> Self {
        Self { question, answer, raw_input, answered_at: Utc::now() }
    }

    pub fn id(&self) -> &str {
        &self.question.id
    }
}

/// Responses collected during one clarification run. Entries can only be
/// appended; existing responses are never edited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseLog {
    responses: Vec<UserResponse>,
}

impl ResponseLog {
    pub fn push(&mut self, response: UserResponse) {
        self.responses.push(response);
    }

    pub fn responses(&self) -> &[UserResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn summary(&self) -> BTreeMap<String, bool> {
        summarize(&self.responses)
    }

    pub fn into_responses(self) -> Vec<UserResponse> {
        self.responses
    }
}

/// Question id to answer. Later answers to the same id win.
pub fn summarize(responses: &[UserResponse]) -> BTreeMap<String, bool> {
    responses.iter().map(|response| (response.id().to_owned(), response.answer)).collect()
}

#[cfg(test)]
mod tests {
    use super::{ResponseLog, UserQuestion, UserResponse};
    use crate::domain::conditions::SpecialCondition;

    fn question(id: &str, category: SpecialCondition) -> UserQuestion {
        UserQuestion {
            id: id.to_owned(),
            category,
            question: format!("Can you satisfy {category}?"),
            impact: "raises the top rate".to_owned(),
        }
    }

    #[test]
    fn log_summarizes_answers_by_question_id() {
        let mut log = ResponseLog::default();
        log.push(UserResponse::new(question("q1", SpecialCondition::BankApp), true, None));
        log.push(UserResponse::new(
            question("q2", SpecialCondition::UsingCard),
            false,
            Some("n".to_owned()),
        ));

        let summary = log.summary();
        assert_eq!(log.len(), 2);
        assert_eq!(summary.get("q1"), Some(&true));
        assert_eq!(summary.get("q2"), Some(&false));
    }

    #[test]
    fn response_serializes_with_flattened_question() {
        let response = UserResponse::new(question("q1", SpecialCondition::Online), true, None);
        let value = serde_json::to_value(&response).expect("serialize");

        assert_eq!(value["id"], "q1");
        assert_eq!(value["category"], "online");
        assert_eq!(value["answer"], true);
    }
}
