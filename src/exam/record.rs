// src/exam/record.rs

//! Persistence for finished sessions and verification captures.

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use super::{
    registry::{LiveSession, SessionRegistry},
    scoring::Mark,
    session::{ExamOutcome, VerificationKind},
};
use crate::{
    error::{AppError, is_unique_violation},
    models::{question::PublicQuestion, result::AnswerDetail},
    verification::ValidatedPair,
};

/// Writes the result of a completed session and returns the new result id.
pub async fn save_outcome(pool: &SqlitePool, live: &LiveSession) -> Result<i64, AppError> {
    let outcome = live.session.outcome().ok_or_else(|| {
        AppError::InternalServerError(format!("session {} has no outcome", live.id))
    })?;

    let details = answer_details(&live.questions, outcome);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exam_results
            (user_id, test_id, session_id, correct_count, total_questions, score_percentage,
             passed, completion, verification_checks, details, started_at, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(live.user_id)
    .bind(live.test_id)
    .bind(live.id.to_string())
    .bind(outcome.score.correct_count as i64)
    .bind(outcome.score.total_questions as i64)
    .bind(outcome.score.percentage)
    .bind(outcome.score.passed)
    .bind(outcome.completion.as_str())
    .bind(outcome.verification_checks as i64)
    .bind(Json(details))
    .bind(live.started_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return AppError::Conflict("You have already completed this test".to_string());
        }
        tracing::error!(session_id = %live.id, "Failed to save exam result: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(
        session_id = %live.id,
        user_id = live.user_id,
        test_id = live.test_id,
        completion = outcome.completion.as_str(),
        score = outcome.score.percentage,
        "Exam result recorded"
    );

    Ok(id)
}

/// Stores the outcome of a completed session once, then evicts it from the registry.
///
/// A failed save leaves the session registered so a later submit or clock tick can retry it.
/// A conflicting result for the same user and test means this attempt can never be stored,
/// so the session is dropped.
pub async fn persist(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    live: &mut LiveSession,
) -> Result<i64, AppError> {
    if let Some(id) = live.result_id {
        return Ok(id);
    }

    match save_outcome(pool, live).await {
        Ok(id) => {
            live.result_id = Some(id);
            registry.remove(live.id).await;
            Ok(id)
        }
        Err(e @ AppError::Conflict(_)) => {
            tracing::warn!(session_id = %live.id, "Discarding attempt for a test that already has a result");
            registry.remove(live.id).await;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

pub async fn save_capture(
    pool: &SqlitePool,
    live: &LiveSession,
    kind: VerificationKind,
    pair: &ValidatedPair,
) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO verification_captures (session_id, user_id, kind, selfie, environment, captured_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(live.id.to_string())
    .bind(live.user_id)
    .bind(kind.as_str())
    .bind(&pair.selfie.data_url)
    .bind(&pair.environment.data_url)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

fn answer_details(questions: &[PublicQuestion], outcome: &ExamOutcome) -> Vec<AnswerDetail> {
    outcome
        .score
        .breakdown
        .iter()
        .map(|mark| {
            let question = questions.iter().find(|q| q.id == mark.question_id);
            let option_text = |option_id: &str| {
                question
                    .and_then(|q| q.options.iter().find(|o| o.id == option_id))
                    .map(|o| o.text.clone())
                    .unwrap_or_else(|| option_id.to_string())
            };

            AnswerDetail {
                question_id: mark.question_id,
                question: question.map(|q| q.content.clone()).unwrap_or_default(),
                your_answer: mark.selected.as_deref().map(&option_text),
                correct_answer: option_text(&mark.correct_option),
                is_correct: mark.mark == Mark::Correct,
                mark: mark.mark,
            }
        })
        .collect()
}
