// src/handlers/exam.rs

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{
        record,
        registry::{LiveSession, SessionRegistry, SharedSession},
        scoring::AnswerKey,
        session::{ExamSession, Navigation, Phase, SessionError, format_clock},
    },
    models::{
        question::{PublicQuestion, Question},
        test::Test,
    },
    utils::jwt::Claims,
    verification::PhotoPair,
};

/// What the exam screen renders. Schedule thresholds stay server-side.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub test_id: i64,
    pub test_name: String,
    pub phase: Phase,
    pub duration_secs: u32,
    pub remaining_secs: u32,
    pub remaining_display: String,
    pub elapsed_secs: u32,
    pub low_time: bool,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<PublicQuestion>,
    pub answers: BTreeMap<i64, String>,
    pub verification_due: bool,
    pub verification_checks: u32,
}

impl SessionView {
    fn of(live: &LiveSession) -> Self {
        let session = &live.session;
        let question_visible = session.phase() == Phase::InProgress && !session.verification_due();

        Self {
            session_id: live.id,
            test_id: live.test_id,
            test_name: live.test_name.clone(),
            phase: session.phase(),
            duration_secs: session.duration_secs(),
            remaining_secs: session.remaining_secs(),
            remaining_display: format_clock(session.remaining_secs()),
            elapsed_secs: session.elapsed_secs(),
            low_time: session.is_running_low(),
            current_index: session.current_index(),
            total_questions: session.question_count(),
            current_question: if question_visible {
                live.current_question().cloned()
            } else {
                None
            },
            answers: session.answers().clone(),
            verification_due: session.verification_due(),
            verification_checks: session.verification_checks(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub option_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NavigateRequest {
    Next,
    Previous,
    Goto { index: usize },
}

/// Looks up a live session owned by the caller. Someone else's session reads as missing.
async fn owned_session(
    registry: &SessionRegistry,
    id: Uuid,
    user_id: i64,
) -> Result<SharedSession, AppError> {
    let not_found = || AppError::NotFound("Exam session not found".to_string());
    let shared = registry.get(id).await.ok_or_else(not_found)?;
    if shared.lock().await.user_id != user_id {
        return Err(not_found());
    }
    Ok(shared)
}

/// Persists a completed session, evicts it, and renders the stored result.
async fn finalize(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    live: &mut LiveSession,
) -> Result<serde_json::Value, AppError> {
    let result_id = record::persist(pool, registry, live).await?;

    let outcome = live
        .session
        .outcome()
        .ok_or_else(|| AppError::InternalServerError("completed session without outcome".into()))?;

    Ok(json!({
        "result_id": result_id,
        "completion": outcome.completion,
        "score": outcome.score.correct_count,
        "max_score": outcome.score.total_questions,
        "score_percentage": outcome.score.percentage,
        "passed": outcome.score.passed,
        "breakdown": outcome.score.breakdown,
        "verification_checks": outcome.verification_checks,
    }))
}

/// Opens an exam session for a test, or returns the caller's live one.
///
/// The clock does not start until the initial verification check is submitted.
pub async fn start_session(
    State(pool): State<SqlitePool>,
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if let Some(existing) = registry.find_active(user_id, test_id).await {
        return resume(&pool, &registry, &existing).await;
    }

    let test = sqlx::query_as::<_, Test>(
        r#"
        SELECT t.id, t.module_id, t.name, t.duration_secs, t.due_date, t.created_at
        FROM tests t
        JOIN modules m ON m.id = t.module_id
        JOIN users u ON u.course_id = m.course_id
        WHERE t.id = ? AND u.id = ?
        "#,
    )
    .bind(test_id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))?;

    let already_taken: Option<i64> =
        sqlx::query_scalar("SELECT id FROM exam_results WHERE test_id = ? AND user_id = ?")
            .bind(test_id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
    if already_taken.is_some() {
        return Err(AppError::Conflict("You have already completed this test".to_string()));
    }

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, test_id, position, content, options, answer, created_at
        FROM questions
        WHERE test_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    let key = AnswerKey::new(questions.iter().map(Question::to_keyed).collect());
    let duration = u32::try_from(test.duration_secs)
        .map_err(|_| AppError::InternalServerError(format!("test {} has a bad duration", test.id)))?;
    let session = ExamSession::new(key, duration)?;

    let live = LiveSession::new(
        user_id,
        test.id,
        test.name,
        questions.iter().map(Question::to_public).collect(),
        session,
    );
    let (shared, created) = registry.find_or_insert(live).await;
    if !created {
        return resume(&pool, &registry, &shared).await;
    }

    let live = shared.lock().await;
    tracing::info!(session_id = %live.id, user_id, test_id, "Exam session opened");
    Ok((StatusCode::CREATED, Json(SessionView::of(&live))))
}

/// Answers a start request with the session already open for that test. A finished attempt
/// whose result was never stored is recorded now and reported as completed.
async fn resume(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    shared: &SharedSession,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let mut live = shared.lock().await;
    if live.session.phase() == Phase::Completed {
        record::persist(pool, registry, &mut live).await?;
        return Err(AppError::Conflict("You have already completed this test".to_string()));
    }
    Ok((StatusCode::OK, Json(SessionView::of(&live))))
}

pub async fn get_session(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&registry, id, claims.user_id()?).await?;
    let live = shared.lock().await;
    Ok(Json(SessionView::of(&live)))
}

/// Completes the pending verification check (initial or periodic) with a selfie and an
/// environment photo.
pub async fn submit_verification(
    State(pool): State<SqlitePool>,
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(photos): Json<PhotoPair>,
) -> Result<impl IntoResponse, AppError> {
    let validated = photos.validate()?;

    let shared = owned_session(&registry, id, claims.user_id()?).await?;
    let mut live = shared.lock().await;

    let kind = {
        let LiveSession { session, rng, .. } = &mut *live;
        session.verify(rng)?
    };
    record::save_capture(&pool, &live, kind, &validated).await?;

    tracing::info!(
        session_id = %live.id,
        kind = kind.as_str(),
        selfie_bytes = validated.selfie.bytes,
        environment_bytes = validated.environment.bytes,
        "Verification check completed"
    );

    Ok(Json(json!({
        "kind": kind,
        "message": "Verification complete. You may continue with your test.",
        "session": SessionView::of(&live),
    })))
}

pub async fn record_answer(
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&registry, id, claims.user_id()?).await?;
    let mut live = shared.lock().await;

    live.session
        .record_answer(payload.question_id, &payload.option_id)?;

    Ok(Json(SessionView::of(&live)))
}

/// Moves between questions. "next" on the last question submits the exam.
pub async fn navigate(
    State(pool): State<SqlitePool>,
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&registry, id, claims.user_id()?).await?;
    let mut live = shared.lock().await;

    let moved = match payload {
        NavigateRequest::Next => live.session.next()?,
        NavigateRequest::Previous => live.session.previous()?,
        NavigateRequest::Goto { index } => live.session.go_to(index)?,
    };

    match moved {
        Navigation::Moved(_) => Ok(Json(json!({ "session": SessionView::of(&live) }))),
        Navigation::Submitted => {
            let result = finalize(&pool, &registry, &mut live).await?;
            Ok(Json(json!({ "result": result })))
        }
    }
}

/// Submits the exam. Repeating it after a failed save stores the finished attempt.
pub async fn submit(
    State(pool): State<SqlitePool>,
    State(registry): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = owned_session(&registry, id, claims.user_id()?).await?;
    let mut live = shared.lock().await;

    if live.result_id.is_some() {
        return Err(SessionError::AlreadyCompleted.into());
    }
    if !live.awaiting_record() {
        live.session.submit()?;
    }
    let result = finalize(&pool, &registry, &mut live).await?;

    Ok(Json(result))
}
