// src/exam/registry.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::session::{ExamSession, Phase, Tick};
use crate::models::question::PublicQuestion;

/// A session held in memory while the student sits the exam.
#[derive(Debug)]
pub struct LiveSession {
    pub id: Uuid,
    pub user_id: i64,
    pub test_id: i64,
    pub test_name: String,
    pub questions: Vec<PublicQuestion>,
    pub started_at: DateTime<Utc>,
    pub session: ExamSession,
    pub rng: StdRng,
    /// Set once the outcome is stored in `exam_results`.
    pub result_id: Option<i64>,
}

impl LiveSession {
    pub fn new(
        user_id: i64,
        test_id: i64,
        test_name: String,
        questions: Vec<PublicQuestion>,
        session: ExamSession,
    ) -> Self {
        Self::with_rng(
            user_id,
            test_id,
            test_name,
            questions,
            session,
            StdRng::from_entropy(),
        )
    }

    pub fn with_rng(
        user_id: i64,
        test_id: i64,
        test_name: String,
        questions: Vec<PublicQuestion>,
        session: ExamSession,
        rng: StdRng,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            test_id,
            test_name,
            questions,
            started_at: Utc::now(),
            session,
            rng,
            result_id: None,
        }
    }

    pub fn current_question(&self) -> Option<&PublicQuestion> {
        self.questions.get(self.session.current_index())
    }

    /// Completed, but the outcome has not been stored yet.
    pub fn awaiting_record(&self) -> bool {
        self.session.phase() == Phase::Completed && self.result_id.is_none()
    }
}

pub type SharedSession = Arc<Mutex<LiveSession>>;

/// All live exam sessions, keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Sessions>>,
}

/// Sessions by id, plus an index of the one live session per (user, test).
/// The index lets lookups avoid locking each session.
#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, SharedSession>,
    by_owner: HashMap<(i64, i64), Uuid>,
}

impl Sessions {
    fn insert(&mut self, live: LiveSession) -> SharedSession {
        let id = live.id;
        self.by_owner.insert((live.user_id, live.test_id), id);
        let shared = Arc::new(Mutex::new(live));
        self.by_id.insert(id, shared.clone());
        shared
    }

    fn owned_by(&self, user_id: i64, test_id: i64) -> Option<SharedSession> {
        self.by_owner
            .get(&(user_id, test_id))
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, live: LiveSession) -> SharedSession {
        self.inner.write().await.insert(live)
    }

    /// Registers `live` unless the same user already has a session for the test.
    /// Returns the registered session and whether it is the one just passed in.
    pub async fn find_or_insert(&self, live: LiveSession) -> (SharedSession, bool) {
        let mut sessions = self.inner.write().await;
        match sessions.owned_by(live.user_id, live.test_id) {
            Some(existing) => (existing, false),
            None => (sessions.insert(live), true),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.inner.write().await;
        sessions.by_owner.retain(|_, owned| *owned != id);
        sessions.by_id.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_id.is_empty()
    }

    /// The caller's live session for a test, if one is still open.
    pub async fn find_active(&self, user_id: i64, test_id: i64) -> Option<SharedSession> {
        self.inner.read().await.owned_by(user_id, test_id)
    }

    /// Advances every session by one second. Returns the sessions whose outcome still has to
    /// be stored: those that expired on this tick and any left over from a failed save.
    pub async fn tick_all(&self) -> Vec<SharedSession> {
        let handles: Vec<SharedSession> =
            self.inner.read().await.by_id.values().cloned().collect();
        let mut unrecorded = Vec::new();

        for handle in handles {
            let mut live = handle.lock().await;
            match live.session.tick() {
                Tick::Expired => {
                    tracing::info!(session_id = %live.id, user_id = live.user_id, "Exam time expired");
                }
                Tick::VerificationDue => {
                    tracing::info!(session_id = %live.id, user_id = live.user_id, "Verification check due");
                }
                Tick::Counted | Tick::Inactive => {}
            }
            if live.awaiting_record() {
                drop(live);
                unrecorded.push(handle);
            }
        }

        unrecorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::scoring::{AnswerKey, KeyedQuestion};

    fn live(user_id: i64, test_id: i64, duration: u32) -> LiveSession {
        let key = AnswerKey::new(vec![KeyedQuestion {
            question_id: 1,
            correct_option: "a".into(),
            option_ids: vec!["a".into(), "b".into()],
        }]);
        let session = ExamSession::new(key, duration).unwrap();
        LiveSession::with_rng(
            user_id,
            test_id,
            "Quiz".into(),
            Vec::new(),
            session,
            StdRng::seed_from_u64(3),
        )
    }

    #[tokio::test]
    async fn find_active_matches_user_and_test() {
        let registry = SessionRegistry::new();
        let shared = registry.insert(live(1, 10, 60)).await;
        let id = shared.lock().await.id;

        let found = registry.find_active(1, 10).await.unwrap();
        assert_eq!(found.lock().await.id, id);
        assert!(registry.find_active(1, 11).await.is_none());
        assert!(registry.find_active(2, 10).await.is_none());
    }

    #[tokio::test]
    async fn tick_all_reports_expired_sessions_only() {
        let registry = SessionRegistry::new();
        let short = registry.insert(live(1, 10, 2)).await;
        let long = registry.insert(live(2, 10, 60)).await;
        let waiting = registry.insert(live(3, 10, 1)).await;

        for shared in [&short, &long] {
            let mut guard = shared.lock().await;
            let LiveSession { session, rng, .. } = &mut *guard;
            session.verify(rng).unwrap();
        }

        assert!(registry.tick_all().await.is_empty());
        let expired = registry.tick_all().await;
        assert_eq!(expired.len(), 1);
        assert!(Arc::ptr_eq(&expired[0], &short));
        assert_eq!(short.lock().await.session.phase(), Phase::Completed);

        // Never verified, so its clock has not moved.
        assert_eq!(waiting.lock().await.session.remaining_secs(), 1);
        assert_eq!(long.lock().await.session.remaining_secs(), 58);
    }

    #[tokio::test]
    async fn remove_drops_session() {
        let registry = SessionRegistry::new();
        let shared = registry.insert(live(1, 10, 60)).await;
        let id = shared.lock().await.id;

        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(id).await.is_some());
        assert!(registry.get(id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn find_or_insert_keeps_one_session_per_user_and_test() {
        let registry = SessionRegistry::new();

        let ((first, first_new), (second, second_new)) = tokio::join!(
            registry.find_or_insert(live(1, 10, 60)),
            registry.find_or_insert(live(1, 10, 60)),
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first_new != second_new);
        assert_eq!(registry.len().await, 1);

        let (_, other_test) = registry.find_or_insert(live(1, 11, 60)).await;
        assert!(other_test);

        let id = first.lock().await.id;
        registry.remove(id).await;
        assert!(registry.find_active(1, 10).await.is_none());
        let (_, reopened) = registry.find_or_insert(live(1, 10, 60)).await;
        assert!(reopened);
    }

    #[tokio::test]
    async fn tick_all_keeps_reporting_unrecorded_sessions() {
        let registry = SessionRegistry::new();
        let shared = registry.insert(live(1, 10, 60)).await;
        {
            let mut guard = shared.lock().await;
            let LiveSession { session, rng, .. } = &mut *guard;
            session.verify(rng).unwrap();
            session.submit().unwrap();
        }

        assert_eq!(registry.tick_all().await.len(), 1);
        assert_eq!(registry.tick_all().await.len(), 1);

        shared.lock().await.result_id = Some(7);
        assert!(registry.tick_all().await.is_empty());
    }
}
