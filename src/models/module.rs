// src/models/module.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'modules' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,

    /// Short unique code, e.g. "CS303".
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub description: Option<String>,
    pub course_id: i64,
    pub lecturer_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    Completed,
    InProgress,
    Upcoming,
}

impl CompletionStatus {
    pub fn from_counts(tests_taken: i64, tests_total: i64) -> Self {
        if tests_taken == 0 {
            CompletionStatus::Upcoming
        } else if tests_taken >= tests_total {
            CompletionStatus::Completed
        } else {
            CompletionStatus::InProgress
        }
    }
}

/// Letter grade for an average percentage; "-" when nothing has been graded yet.
pub fn letter_grade(average: Option<f64>) -> &'static str {
    match average {
        None => "-",
        Some(avg) if avg >= 80.0 => "A",
        Some(avg) if avg >= 70.0 => "B",
        Some(avg) if avg >= 60.0 => "C",
        Some(avg) if avg >= 50.0 => "D",
        Some(_) => "F",
    }
}

/// Module row as a student sees it on the dashboard.
#[derive(Debug, Serialize)]
pub struct StudentModule {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub grade: &'static str,
    pub completion_status: CompletionStatus,
    pub tests_total: i64,
    pub tests_taken: i64,
}

/// DTO for creating a module.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 2, max = 20, message = "Code must be at least 2 characters"))]
    pub code: String,
    #[validate(length(min = 3, max = 200, message = "Name must be at least 3 characters"))]
    pub name: String,
    #[validate(range(min = 1, max = 60, message = "Credits must be between 1 and 60"))]
    pub credits: i64,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub course_id: i64,
    pub lecturer_id: Option<i64>,
}

/// DTO for updating a module. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 2, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 3, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 60))]
    pub credits: Option<i64>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub course_id: Option<i64>,
    pub lecturer_id: Option<i64>,
}
