// src/exam/session.rs

//! State of one in-progress timed test.
//!
//! The session starts waiting for the initial identity check. Once that passes the countdown
//! runs, one second per [`ExamSession::tick`], until the student submits or the clock reaches
//! zero. While the clock runs, re-verification checks fall due on a randomized schedule; a due
//! check blocks answering and navigation, but never stops the clock.

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use super::{
    schedule,
    scoring::{self, AnswerKey, ScoreSummary},
};
use crate::config::LOW_TIME_THRESHOLD_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingVerification,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Submitted,
    TimeExpired,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Submitted => "submitted",
            Completion::TimeExpired => "time_expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Initial,
    Periodic,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Initial => "initial",
            VerificationKind::Periodic => "periodic",
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The clock is not running.
    Inactive,
    Counted,
    VerificationDue,
    /// The clock hit zero and the exam was submitted.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    Submitted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamOutcome {
    pub completion: Completion,
    pub score: ScoreSummary,
    pub verification_checks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("exam has no questions")]
    EmptyExam,
    #[error("exam duration must be positive")]
    ZeroDuration,
    #[error("exam has not started; complete the identity check first")]
    NotStarted,
    #[error("a verification check is pending")]
    VerificationPending,
    #[error("no verification check is due")]
    NoVerificationDue,
    #[error("exam has already been completed")]
    AlreadyCompleted,
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(i64),
    #[error("option '{option}' does not belong to question {question_id}")]
    UnknownOption { question_id: i64, option: String },
    #[error("question index {index} is out of range (exam has {len} questions)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    key: AnswerKey,
    phase: Phase,
    duration_secs: u32,
    remaining_secs: u32,
    current_index: usize,
    answers: BTreeMap<i64, String>,
    next_check_at: Option<u32>,
    verification_due: bool,
    verification_checks: u32,
    outcome: Option<ExamOutcome>,
}

impl ExamSession {
    pub fn new(key: AnswerKey, duration_secs: u32) -> Result<Self, SessionError> {
        if key.is_empty() {
            return Err(SessionError::EmptyExam);
        }
        if duration_secs == 0 {
            return Err(SessionError::ZeroDuration);
        }

        Ok(Self {
            key,
            phase: Phase::AwaitingVerification,
            duration_secs,
            remaining_secs: duration_secs,
            current_index: 0,
            answers: BTreeMap::new(),
            next_check_at: None,
            verification_due: false,
            verification_checks: 0,
            outcome: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs - self.remaining_secs
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn question_count(&self) -> usize {
        self.key.len()
    }

    pub fn answers(&self) -> &BTreeMap<i64, String> {
        &self.answers
    }

    pub fn verification_due(&self) -> bool {
        self.verification_due
    }

    pub fn verification_checks(&self) -> u32 {
        self.verification_checks
    }

    pub fn outcome(&self) -> Option<&ExamOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_running_low(&self) -> bool {
        self.phase == Phase::InProgress && self.remaining_secs < LOW_TIME_THRESHOLD_SECS
    }

    /// Threshold of the next scheduled check. Kept off the wire; exposed for the engine's own
    /// callers and tests.
    pub fn next_check_at(&self) -> Option<u32> {
        self.next_check_at
    }

    /// Completes whichever verification the session is waiting for.
    pub fn verify<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<VerificationKind, SessionError> {
        match self.phase {
            Phase::AwaitingVerification => {
                self.phase = Phase::InProgress;
                self.next_check_at = Some(schedule::first_check(self.remaining_secs));
                Ok(VerificationKind::Initial)
            }
            Phase::InProgress if self.verification_due => {
                self.verification_due = false;
                self.verification_checks += 1;
                self.next_check_at = Some(schedule::next_check(self.remaining_secs, rng));
                Ok(VerificationKind::Periodic)
            }
            Phase::InProgress => Err(SessionError::NoVerificationDue),
            Phase::Completed => Err(SessionError::AlreadyCompleted),
        }
    }

    /// Advances the clock by one second.
    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::InProgress {
            return Tick::Inactive;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        if self.remaining_secs == 0 {
            self.finish(Completion::TimeExpired);
            return Tick::Expired;
        }

        if !self.verification_due {
            if let Some(threshold) = self.next_check_at {
                if self.remaining_secs <= threshold {
                    self.verification_due = true;
                    self.next_check_at = None;
                    return Tick::VerificationDue;
                }
            }
        }

        Tick::Counted
    }

    pub fn record_answer(&mut self, question_id: i64, option_id: &str) -> Result<(), SessionError> {
        self.ensure_answerable()?;

        let question = self
            .key
            .get(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;

        if !question.option_ids.iter().any(|o| o == option_id) {
            return Err(SessionError::UnknownOption {
                question_id,
                option: option_id.to_string(),
            });
        }

        self.answers.insert(question_id, option_id.to_string());
        Ok(())
    }

    /// Moves forward; on the last question this submits the exam.
    pub fn next(&mut self) -> Result<Navigation, SessionError> {
        self.ensure_answerable()?;

        if self.current_index + 1 < self.key.len() {
            self.current_index += 1;
            Ok(Navigation::Moved(self.current_index))
        } else {
            self.finish(Completion::Submitted);
            Ok(Navigation::Submitted)
        }
    }

    pub fn previous(&mut self) -> Result<Navigation, SessionError> {
        self.ensure_answerable()?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(Navigation::Moved(self.current_index))
    }

    pub fn go_to(&mut self, index: usize) -> Result<Navigation, SessionError> {
        self.ensure_answerable()?;
        if index >= self.key.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.key.len(),
            });
        }
        self.current_index = index;
        Ok(Navigation::Moved(index))
    }

    pub fn submit(&mut self) -> Result<&ExamOutcome, SessionError> {
        self.ensure_answerable()?;
        Ok(self.finish(Completion::Submitted))
    }

    fn ensure_answerable(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::AwaitingVerification => Err(SessionError::NotStarted),
            Phase::Completed => Err(SessionError::AlreadyCompleted),
            Phase::InProgress if self.verification_due => Err(SessionError::VerificationPending),
            Phase::InProgress => Ok(()),
        }
    }

    fn finish(&mut self, completion: Completion) -> &ExamOutcome {
        self.phase = Phase::Completed;
        self.verification_due = false;
        self.next_check_at = None;
        let score = scoring::score(&self.key, &self.answers);
        self.outcome.insert(ExamOutcome {
            completion,
            score,
            verification_checks: self.verification_checks,
        })
    }
}

/// Renders a second count as `m:ss`.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
