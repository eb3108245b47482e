// src/handlers/lecturer.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::{
    error::AppError,
    models::result::{StudentSubmission, TestReport},
    utils::jwt::Claims,
};

#[derive(FromRow)]
struct SubmissionRow {
    result_id: i64,
    student_id: i64,
    name: String,
    surname: String,
    id_number: Option<String>,
    score: i64,
    max_score: i64,
    score_percentage: f64,
    passed: bool,
    completion: String,
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
}

impl From<SubmissionRow> for StudentSubmission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            time_spent_secs: (row.submitted_at - row.started_at).num_seconds().max(0),
            result_id: row.result_id,
            student_id: row.student_id,
            student_name: format!("{} {}", row.name, row.surname),
            id_number: row.id_number,
            score: row.score,
            max_score: row.max_score,
            score_percentage: row.score_percentage,
            passed: row.passed,
            completion: row.completion,
            submitted_at: row.submitted_at,
        }
    }
}

/// Per-test aggregates for the modules the caller lectures. Admins see every test.
pub async fn reports(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let reports = sqlx::query_as::<_, TestReport>(
        r#"
        SELECT
            t.id AS test_id, t.name, m.code AS module_code, m.name AS module, t.due_date,
            COUNT(r.id) AS submissions,
            AVG(r.score_percentage) AS average_score,
            MAX(r.score_percentage) AS highest_score,
            MIN(r.score_percentage) AS lowest_score,
            CASE WHEN COUNT(r.id) = 0 THEN NULL
                 ELSE 100.0 * SUM(CASE WHEN r.passed THEN 1 ELSE 0 END) / COUNT(r.id)
            END AS pass_rate
        FROM tests t
        JOIN modules m ON m.id = t.module_id
        LEFT JOIN exam_results r ON r.test_id = t.id
        WHERE ? OR m.lecturer_id = ?
        GROUP BY t.id
        ORDER BY t.due_date DESC, t.id
        "#,
    )
    .bind(claims.is_admin())
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(reports))
}

/// Every student submission for one test. Tests outside the caller's modules read as missing.
pub async fn test_results(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let visible: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT t.id
        FROM tests t
        JOIN modules m ON m.id = t.module_id
        WHERE t.id = ? AND (? OR m.lecturer_id = ?)
        "#,
    )
    .bind(test_id)
    .bind(claims.is_admin())
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;
    if visible.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT
            r.id AS result_id, u.id AS student_id, u.name, u.surname, u.id_number,
            r.correct_count AS score, r.total_questions AS max_score,
            r.score_percentage, r.passed, r.completion,
            r.started_at, r.completed_at AS submitted_at
        FROM exam_results r
        JOIN users u ON u.id = r.user_id
        WHERE r.test_id = ?
        ORDER BY r.score_percentage DESC, r.completed_at
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    let submissions: Vec<StudentSubmission> = rows.into_iter().map(Into::into).collect();
    Ok(Json(submissions))
}
