// src/models/question.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::exam::scoring::KeyedQuestion;

/// A selectable answer, e.g. `{"id": "c", "text": "Paris"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,

    /// Order of the question inside its test.
    pub position: i64,

    /// The text content of the question.
    pub content: String,

    /// Stored as a JSON array in the database.
    pub options: Json<Vec<QuestionOption>>,

    /// Id of the correct option.
    pub answer: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            content: self.content.clone(),
            options: self.options.0.clone(),
        }
    }

    pub fn to_keyed(&self) -> KeyedQuestion {
        KeyedQuestion {
            question_id: self.id,
            correct_option: self.answer.clone(),
            option_ids: self.options.iter().map(|o| o.id.clone()).collect(),
        }
    }
}

/// DTO for sending a question to a student (excludes the answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub options: Vec<QuestionOption>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_answer_in_options))]
pub struct CreateQuestionRequest {
    pub position: Option<i64>,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
    #[validate(length(min = 1, max = 20))]
    pub answer: String,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub position: Option<i64>,
    #[validate(length(min = 1, max = 1000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<QuestionOption>>,
    #[validate(length(min = 1, max = 20))]
    pub answer: Option<String>,
}

pub fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    let mut seen = HashSet::new();
    for opt in options {
        if opt.id.is_empty() || opt.id.len() > 20 {
            return Err(validator::ValidationError::new("invalid_option_id"));
        }
        if opt.text.is_empty() || opt.text.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_text"));
        }
        if !seen.insert(opt.id.as_str()) {
            return Err(validator::ValidationError::new("duplicate_option_id"));
        }
    }
    Ok(())
}

fn validate_answer_in_options(
    req: &CreateQuestionRequest,
) -> Result<(), validator::ValidationError> {
    if req.options.iter().any(|o| o.id == req.answer) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("answer_not_in_options"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(id: &str, text: &str) -> QuestionOption {
        QuestionOption {
            id: id.into(),
            text: text.into(),
        }
    }

    #[test]
    fn create_request_requires_answer_among_options() {
        let mut req = CreateQuestionRequest {
            position: None,
            content: "Which planet is known as the Red Planet?".into(),
            options: vec![opt("a", "Venus"), opt("b", "Mars")],
            answer: "b".into(),
        };
        assert!(req.validate().is_ok());

        req.answer = "c".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn options_must_be_unique_and_plural() {
        assert!(validate_options(&[opt("a", "x")]).is_err());
        assert!(validate_options(&[opt("a", "x"), opt("a", "y")]).is_err());
        assert!(validate_options(&[opt("a", "x"), opt("b", "y")]).is_ok());
    }
}
