// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::{
    error::AppError,
    handlers::auth::fetch_user,
    models::{
        module::{CompletionStatus, StudentModule, letter_grade},
        result::{ExamResult, ResultSummary, StudentStats},
        test::{StudentTest, StudentTestRow},
    },
    utils::jwt::Claims,
};

#[derive(FromRow)]
struct ModuleProgressRow {
    id: i64,
    code: String,
    name: String,
    credits: i64,
    tests_total: i64,
    tests_taken: i64,
    average_score: Option<f64>,
}

/// Tests visible to a student: every test in a module of their course.
const STUDENT_TESTS_SQL: &str = r#"
    SELECT
        t.id, t.name, m.code AS module_code, m.name AS module_name,
        t.duration_secs, t.due_date,
        (SELECT COUNT(*) FROM questions q WHERE q.test_id = t.id) AS question_count,
        EXISTS (SELECT 1 FROM exam_results r WHERE r.test_id = t.id AND r.user_id = ?) AS has_result
    FROM tests t
    JOIN modules m ON m.id = t.module_id
    WHERE m.course_id = ?
"#;

async fn student_course(pool: &SqlitePool, claims: &Claims) -> Result<(i64, Option<i64>), AppError> {
    let user = fetch_user(pool, claims.user_id()?).await?;
    Ok((user.id, user.course_id))
}

/// Headline numbers for the student dashboard.
pub async fn dashboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, course_id) = student_course(&pool, &claims).await?;

    let (tests_completed, average_score): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(score_percentage) FROM exam_results WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let upcoming_tests: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM tests t
        JOIN modules m ON m.id = t.module_id
        WHERE m.course_id = ?
          AND t.due_date > ?
          AND NOT EXISTS (SELECT 1 FROM exam_results r WHERE r.test_id = t.id AND r.user_id = ?)
        "#,
    )
    .bind(course_id)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let modules: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM modules WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(StudentStats {
        tests_completed,
        average_score: average_score.unwrap_or(0.0),
        upcoming_tests,
        modules,
    }))
}

/// Modules of the student's course with progress and grade.
pub async fn list_modules(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, course_id) = student_course(&pool, &claims).await?;

    let rows = sqlx::query_as::<_, ModuleProgressRow>(
        r#"
        SELECT
            m.id, m.code, m.name, m.credits,
            (SELECT COUNT(*) FROM tests t WHERE t.module_id = m.id) AS tests_total,
            (SELECT COUNT(DISTINCT r.test_id)
               FROM exam_results r JOIN tests t ON t.id = r.test_id
              WHERE t.module_id = m.id AND r.user_id = ?) AS tests_taken,
            (SELECT AVG(r.score_percentage)
               FROM exam_results r JOIN tests t ON t.id = r.test_id
              WHERE t.module_id = m.id AND r.user_id = ?) AS average_score
        FROM modules m
        WHERE m.course_id = ?
        ORDER BY m.code
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    let modules: Vec<StudentModule> = rows
        .into_iter()
        .map(|row| StudentModule {
            grade: letter_grade(row.average_score),
            completion_status: CompletionStatus::from_counts(row.tests_taken, row.tests_total),
            id: row.id,
            code: row.code,
            name: row.name,
            credits: row.credits,
            tests_total: row.tests_total,
            tests_taken: row.tests_taken,
        })
        .collect();

    Ok(Json(modules))
}

/// Tests of one module, with the caller's status for each.
pub async fn module_tests(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, course_id) = student_course(&pool, &claims).await?;

    let module_exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM modules WHERE code = ? AND course_id = ?")
            .bind(&code)
            .bind(course_id)
            .fetch_optional(&pool)
            .await?;
    if module_exists.is_none() {
        return Err(AppError::NotFound(format!("Module '{}' not found", code)));
    }

    let rows = sqlx::query_as::<_, StudentTestRow>(&format!(
        "{} AND m.code = ? ORDER BY t.due_date",
        STUDENT_TESTS_SQL
    ))
    .bind(user_id)
    .bind(course_id)
    .bind(&code)
    .fetch_all(&pool)
    .await?;

    let now = Utc::now();
    let tests: Vec<StudentTest> = rows
        .into_iter()
        .map(|row| StudentTest::from_row(row, now))
        .collect();

    Ok(Json(tests))
}

/// Tests the student has not sat yet, soonest due first.
pub async fn upcoming_tests(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, course_id) = student_course(&pool, &claims).await?;

    let rows = sqlx::query_as::<_, StudentTestRow>(&format!(
        "{} ORDER BY t.due_date",
        STUDENT_TESTS_SQL
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    let now = Utc::now();
    let tests: Vec<StudentTest> = rows
        .into_iter()
        .filter(|row| !row.has_result)
        .map(|row| StudentTest::from_row(row, now))
        .collect();

    Ok(Json(tests))
}

/// The caller's results, newest first.
pub async fn list_results(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let results = sqlx::query_as::<_, ResultSummary>(
        r#"
        SELECT
            r.id, r.test_id, t.name, m.name AS module,
            r.correct_count AS score, r.total_questions AS max_score,
            r.score_percentage, r.passed, r.completion, r.completed_at AS date
        FROM exam_results r
        JOIN tests t ON t.id = r.test_id
        JOIN modules m ON m.id = t.module_id
        WHERE r.user_id = ?
        ORDER BY r.completed_at DESC, r.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}

#[derive(Serialize)]
struct ResultDetailResponse {
    #[serde(flatten)]
    result: ExamResult,
    test_name: String,
    module: String,
    time_spent_secs: i64,
}

/// One of the caller's results with the per-question breakdown.
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = sqlx::query_as::<_, ExamResult>(
        r#"
        SELECT id, user_id, test_id, session_id, correct_count, total_questions,
               score_percentage, passed, completion, verification_checks, details,
               started_at, completed_at
        FROM exam_results
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    let (test_name, module): (String, String) = sqlx::query_as(
        "SELECT t.name, m.name FROM tests t JOIN modules m ON m.id = t.module_id WHERE t.id = ?",
    )
    .bind(result.test_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(ResultDetailResponse {
        time_spent_secs: result.time_spent_secs(),
        result,
        test_name,
        module,
    }))
}
