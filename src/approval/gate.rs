//! Approval gate for destructive plans
//!
//! `propose` parks a plan until its requester accepts or rejects it, or the
//! approval window closes. Sessions are independent: one pending approval
//! never blocks another request.

use crate::core::config::ApprovalConfig;
use crate::core::types::{SessionId, UserId};
use crate::events::{Event, EventBus};
use crate::plan::Plan;
use ahash::AHashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Proposed,
    Approved,
    Rejected,
    /// Window closed without an answer; treated as a rejection
    Expired,
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalState::Proposed)
    }
}

/// A requester's answer to a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Accept,
    Reject,
}

impl Acknowledgement {
    /// Map a reaction emoji to an answer
    pub fn from_reaction(emoji: &str) -> Option<Self> {
        match emoji.trim().trim_end_matches('\u{fe0f}') {
            "✅" | "👍" | "✔" => Some(Acknowledgement::Accept),
            "❌" | "👎" | "✖" => Some(Acknowledgement::Reject),
            _ => None,
        }
    }

    /// Map a typed reply (or reaction) to an answer
    pub fn from_reply(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "y" | "yes" | "approve" | "accept" | "confirm" => Some(Acknowledgement::Accept),
            "n" | "no" | "reject" | "deny" | "cancel" => Some(Acknowledgement::Reject),
            other => Self::from_reaction(other),
        }
    }
}

/// Result of an `acknowledge` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Session resolved with this answer
    Recorded,
    /// Someone other than the requester answered; ignored
    NotRequester,
    /// No pending session with this id (never existed or already resolved)
    UnknownSession,
    /// The proposal closed before the answer could be delivered
    Expired,
}

/// Snapshot of a proposal; `state` is `Proposed` while pending
#[derive(Debug, Clone)]
pub struct ApprovalSession {
    pub id: SessionId,
    pub plan: Plan,
    pub requester: UserId,
    pub proposed_at: Instant,
    pub deadline: Instant,
    pub state: ApprovalState,
}

/// How a proposal closed
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    /// The session as it closed, terminal state included
    pub session: ApprovalSession,
}

impl ApprovalOutcome {
    pub fn state(&self) -> ApprovalState {
        self.session.state
    }

    pub fn is_approved(&self) -> bool {
        self.state() == ApprovalState::Approved
    }
}

struct Pending {
    session: ApprovalSession,
    reply: oneshot::Sender<Acknowledgement>,
}

/// Tracks pending proposals; cheap to clone and share between tasks
#[derive(Clone)]
pub struct ApprovalGate {
    sessions: Arc<Mutex<AHashMap<SessionId, Pending>>>,
    window: Duration,
    bus: Option<Arc<EventBus>>,
}

impl ApprovalGate {
    pub fn new(config: &ApprovalConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(AHashMap::new())),
            window: config.window(),
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Ask `requester` to confirm `plan`; resolves on answer or deadline
    pub async fn propose(&self, plan: &Plan, requester: &str) -> ApprovalOutcome {
        let id = SessionId::new();
        let (reply, answer) = oneshot::channel();
        let proposed_at = Instant::now();
        let session = ApprovalSession {
            id,
            plan: plan.clone(),
            requester: requester.to_string(),
            proposed_at,
            deadline: proposed_at + self.window,
            state: ApprovalState::Proposed,
        };

        let mut closed = session.clone();
        self.lock().insert(id, Pending { session, reply });
        info!(session = %id, requester, window_secs = self.window.as_secs(), "approval requested");
        self.emit(Event::ApprovalRequested {
            session: id,
            requester: requester.to_string(),
            summary: plan.summary(),
            window_secs: self.window.as_secs(),
        });

        let state = match tokio::time::timeout(self.window, answer).await {
            Ok(Ok(Acknowledgement::Accept)) => ApprovalState::Approved,
            Ok(Ok(Acknowledgement::Reject)) => ApprovalState::Rejected,
            // Sender dropped without an answer, or deadline passed
            Ok(Err(_)) | Err(_) => ApprovalState::Expired,
        };

        // Already removed when acknowledged; this clears expired sessions
        self.lock().remove(&id);
        info!(session = %id, ?state, "approval resolved");
        self.emit(Event::ApprovalResolved { session: id, state });

        closed.state = state;
        ApprovalOutcome { session: closed }
    }

    /// Record an answer for a pending session
    pub fn acknowledge(&self, session: SessionId, user: &str, ack: Acknowledgement) -> AckStatus {
        let mut sessions = self.lock();
        let Some(pending) = sessions.get(&session) else {
            debug!(session = %session, "acknowledgement for unknown session");
            return AckStatus::UnknownSession;
        };
        if pending.session.requester != user {
            debug!(session = %session, user, "ignoring acknowledgement from non-requester");
            return AckStatus::NotRequester;
        }

        let Some(pending) = sessions.remove(&session) else {
            return AckStatus::UnknownSession;
        };
        // Fails when the proposer stopped waiting (deadline or cancellation)
        if pending.reply.send(ack).is_err() {
            debug!(session = %session, "acknowledgement arrived after the proposal closed");
            return AckStatus::Expired;
        }
        AckStatus::Recorded
    }

    /// Pending sessions opened by `requester`, oldest first
    pub fn pending_for(&self, requester: &str) -> Vec<SessionId> {
        let sessions = self.lock();
        let mut pending: Vec<&ApprovalSession> = sessions
            .values()
            .map(|p| &p.session)
            .filter(|s| s.requester == requester)
            .collect();
        pending.sort_by_key(|s| s.proposed_at);
        pending.iter().map(|s| s.id).collect()
    }

    pub fn session(&self, id: SessionId) -> Option<ApprovalSession> {
        self.lock().get(&id).map(|p| p.session.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<SessionId, Pending>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.emit(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;

    fn plan() -> Plan {
        Plan::sequential(vec![Step::new("1", "member.ban").with_param("user", "42")]).with_approval()
    }

    fn gate() -> ApprovalGate {
        ApprovalGate::new(&ApprovalConfig::default())
    }

    async fn wait_for_session(gate: &ApprovalGate, requester: &str) -> SessionId {
        loop {
            if let Some(id) = gate.pending_for(requester).first() {
                return *id;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_reaction_mapping() {
        assert_eq!(Acknowledgement::from_reaction("✅"), Some(Acknowledgement::Accept));
        assert_eq!(Acknowledgement::from_reaction("👍"), Some(Acknowledgement::Accept));
        assert_eq!(Acknowledgement::from_reaction("❌"), Some(Acknowledgement::Reject));
        assert_eq!(Acknowledgement::from_reaction("👎"), Some(Acknowledgement::Reject));
        assert_eq!(Acknowledgement::from_reaction("🎉"), None);
        assert_eq!(Acknowledgement::from_reply(" Yes "), Some(Acknowledgement::Accept));
        assert_eq!(Acknowledgement::from_reply("n"), Some(Acknowledgement::Reject));
        assert_eq!(Acknowledgement::from_reply("maybe"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requester_accepts() {
        let gate = gate();
        let proposer = gate.clone();
        let handle = tokio::spawn(async move { proposer.propose(&plan(), "alice").await });

        let id = wait_for_session(&gate, "alice").await;
        assert_eq!(gate.session(id).unwrap().state, ApprovalState::Proposed);
        assert_eq!(gate.acknowledge(id, "alice", Acknowledgement::Accept), AckStatus::Recorded);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.state(), ApprovalState::Approved);
        assert_eq!(outcome.session.id, id);
        assert!(outcome.is_approved());
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_requester_counts() {
        let gate = gate();
        let proposer = gate.clone();
        let handle = tokio::spawn(async move { proposer.propose(&plan(), "alice").await });

        let id = wait_for_session(&gate, "alice").await;
        assert_eq!(
            gate.acknowledge(id, "mallory", Acknowledgement::Accept),
            AckStatus::NotRequester
        );
        assert_eq!(gate.acknowledge(id, "alice", Acknowledgement::Reject), AckStatus::Recorded);
        assert_eq!(handle.await.unwrap().state(), ApprovalState::Rejected);

        // Terminal: later answers find nothing
        assert_eq!(
            gate.acknowledge(id, "alice", Acknowledgement::Accept),
            AckStatus::UnknownSession
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_proposal_expires() {
        let gate = gate();
        let started = Instant::now();
        let outcome = gate.propose(&plan(), "alice").await;
        assert_eq!(outcome.state(), ApprovalState::Expired);
        assert_eq!(outcome.session.state, ApprovalState::Expired);
        assert!(!outcome.is_approved());
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let gate = gate();
        let a = gate.clone();
        let b = gate.clone();
        let first = tokio::spawn(async move { a.propose(&plan(), "alice").await });
        let second = tokio::spawn(async move { b.propose(&plan(), "bob").await });

        let bob_session = wait_for_session(&gate, "bob").await;
        gate.acknowledge(bob_session, "bob", Acknowledgement::Accept);
        assert_eq!(second.await.unwrap().state(), ApprovalState::Approved);

        // alice never answers
        assert_eq!(first.await.unwrap().state(), ApprovalState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_proposer_stopped_waiting() {
        let gate = gate();
        let proposer = gate.clone();
        let handle = tokio::spawn(async move { proposer.propose(&plan(), "alice").await });

        let id = wait_for_session(&gate, "alice").await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(gate.acknowledge(id, "alice", Acknowledgement::Accept), AckStatus::Expired);
        assert_eq!(gate.pending_count(), 0);
    }
}
