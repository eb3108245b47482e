// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::exam::scoring::Mark;

/// Per-question snapshot stored with a result, so later edits to the question bank do not
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub question_id: i64,
    pub question: String,
    pub your_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub mark: Mark,
}

/// Represents the 'exam_results' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamResult {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub session_id: String,
    pub correct_count: i64,
    pub total_questions: i64,
    pub score_percentage: f64,
    pub passed: bool,
    /// 'submitted' or 'time_expired'.
    pub completion: String,
    pub verification_checks: i64,
    pub details: Json<Vec<AnswerDetail>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExamResult {
    pub fn time_spent_secs(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds().max(0)
    }
}

/// Result list entry for the student dashboard.
#[derive(Debug, Serialize, FromRow)]
pub struct ResultSummary {
    pub id: i64,
    pub test_id: i64,
    pub name: String,
    pub module: String,
    pub score: i64,
    pub max_score: i64,
    pub score_percentage: f64,
    pub passed: bool,
    pub completion: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StudentStats {
    pub tests_completed: i64,
    pub average_score: f64,
    pub upcoming_tests: i64,
    pub modules: i64,
}

/// One row of the lecturer's report table.
#[derive(Debug, Serialize, FromRow)]
pub struct TestReport {
    pub test_id: i64,
    pub name: String,
    pub module_code: String,
    pub module: String,
    pub due_date: DateTime<Utc>,
    pub submissions: i64,
    pub average_score: Option<f64>,
    pub highest_score: Option<f64>,
    pub lowest_score: Option<f64>,
    pub pass_rate: Option<f64>,
}

/// A student's submission for one test, as shown to lecturers.
#[derive(Debug, Serialize)]
pub struct StudentSubmission {
    pub result_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub id_number: Option<String>,
    pub score: i64,
    pub max_score: i64,
    pub score_percentage: f64,
    pub passed: bool,
    pub completion: String,
    pub submitted_at: DateTime<Utc>,
    pub time_spent_secs: i64,
}
