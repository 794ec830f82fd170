//! Workflow records and the registry that owns them

use crate::command::ResolutionSource;
use crate::core::types::WorkflowId;
use crate::plan::Plan;
use ahash::AHashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_id: String,
    /// Action as dispatched (after correction)
    pub action: String,
    pub source: ResolutionSource,
    pub success: bool,
    pub details: Value,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl StepResult {
    pub fn failed(step_id: &str, action: &str, source: ResolutionSource, error: String) -> Self {
        Self {
            step_id: step_id.to_string(),
            action: action.to_string(),
            source,
            success: false,
            details: Value::Null,
            error: Some(error),
            elapsed: Duration::ZERO,
        }
    }
}

/// Full history of one plan execution
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub plan: Plan,
    pub started_at: SystemTime,
    pub finished_at: Option<SystemTime>,
    pub status: WorkflowStatus,
    /// Index of the step currently (or last) dispatched
    pub step_cursor: usize,
    pub results: Vec<StepResult>,
    /// Error of the critical step that aborted the workflow
    pub error: Option<String>,
}

impl WorkflowRecord {
    pub fn new(id: WorkflowId, plan: Plan) -> Self {
        Self {
            id,
            plan,
            started_at: SystemTime::now(),
            finished_at: None,
            status: WorkflowStatus::Running,
            step_cursor: 0,
            results: Vec::new(),
            error: None,
        }
    }

    pub fn summary(&self) -> WorkflowSummary {
        let succeeded = self.results.iter().filter(|r| r.success).count();
        WorkflowSummary {
            id: self.id,
            status: self.status,
            total_steps: self.plan.steps.len(),
            executed_steps: self.results.len(),
            succeeded,
            failed: self.results.len() - succeeded,
            error: self.error.clone(),
        }
    }
}

/// Compact view of a workflow for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub status: WorkflowStatus,
    pub total_steps: usize,
    pub executed_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub error: Option<String>,
}

#[derive(Default)]
struct RegistryInner {
    records: AHashMap<WorkflowId, WorkflowRecord>,
    /// Registration order, oldest first
    order: VecDeque<WorkflowId>,
}

/// In-memory store of workflow records
///
/// Keeps at most `max_retained` records; the oldest finished ones are
/// dropped first. Running workflows are never evicted.
#[derive(Clone)]
pub struct WorkflowRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    max_retained: usize,
}

impl WorkflowRegistry {
    pub fn new(max_retained: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            max_retained,
        }
    }

    pub fn register(&self, record: WorkflowRecord) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.order.push_back(record.id);
        inner.records.insert(record.id, record);
        Self::evict(&mut inner, self.max_retained);
    }

    /// Apply `f` to a record; false when the id is unknown
    pub fn update<F>(&self, id: WorkflowId, f: F) -> bool
    where
        F: FnOnce(&mut WorkflowRecord),
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.records.get_mut(&id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// Apply `f` and snapshot the result under the same lock
    ///
    /// The snapshot stays valid even if the record is evicted right after.
    pub fn update_and_get<F>(&self, id: WorkflowId, f: F) -> Option<WorkflowRecord>
    where
        F: FnOnce(&mut WorkflowRecord),
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.records.get_mut(&id)?;
        f(record);
        Some(record.clone())
    }

    pub fn get(&self, id: WorkflowId) -> Option<WorkflowRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.records.get(&id).cloned()
    }

    pub fn summary(&self, id: WorkflowId) -> Option<WorkflowSummary> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.records.get(&id).map(WorkflowRecord::summary)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(inner: &mut RegistryInner, max_retained: usize) {
        let mut excess = inner.records.len().saturating_sub(max_retained);
        if excess == 0 {
            return;
        }
        let RegistryInner { records, order } = inner;
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = records.get(id).map_or(true, |r| r.status.is_finished());
            if finished {
                records.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;

    fn record(status: WorkflowStatus) -> WorkflowRecord {
        let plan = Plan::sequential(vec![Step::new("1", "message.create")]);
        let mut record = WorkflowRecord::new(WorkflowId::new(), plan);
        record.status = status;
        record
    }

    #[test]
    fn test_register_and_update() {
        let registry = WorkflowRegistry::new(8);
        let rec = record(WorkflowStatus::Running);
        let id = rec.id;
        registry.register(rec);

        assert!(registry.update(id, |r| r.status = WorkflowStatus::Completed));
        assert_eq!(registry.get(id).unwrap().status, WorkflowStatus::Completed);
        assert!(!registry.update(WorkflowId::new(), |_| {}));
    }

    #[test]
    fn test_eviction_skips_running() {
        let registry = WorkflowRegistry::new(2);
        let running = record(WorkflowStatus::Running);
        let running_id = running.id;
        let done = record(WorkflowStatus::Completed);
        let done_id = done.id;

        registry.register(running);
        registry.register(done);
        registry.register(record(WorkflowStatus::Failed));

        assert_eq!(registry.len(), 2);
        assert!(registry.get(running_id).is_some());
        assert!(registry.get(done_id).is_none());
    }

    #[test]
    fn test_finished_snapshot_survives_eviction() {
        let registry = WorkflowRegistry::new(1);
        let rec = record(WorkflowStatus::Running);
        let id = rec.id;
        registry.register(rec);

        let snapshot = registry
            .update_and_get(id, |r| r.status = WorkflowStatus::Completed)
            .unwrap();
        registry.register(record(WorkflowStatus::Running));

        assert!(registry.get(id).is_none());
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.status, WorkflowStatus::Completed);
        assert!(registry.update_and_get(id, |_| {}).is_none());
    }

    #[test]
    fn test_summary_counts() {
        let mut rec = record(WorkflowStatus::Completed);
        rec.results.push(StepResult::failed(
            "1",
            "message.create",
            ResolutionSource::Exact,
            "boom".into(),
        ));
        let summary = rec.summary();
        assert_eq!(summary.total_steps, 1);
        assert_eq!(summary.executed_steps, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 0);
    }
}
