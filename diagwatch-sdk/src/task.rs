//! The diagnostic task capability and its simple variants.

use std::fmt;
use std::sync::Arc;

use diagwatch_types::StatusRecord;
use tracing::warn;

use crate::error::Result;

/// Anything that can report its current health.
///
/// `evaluate` is called by a reporter on its own schedule, possibly from
/// another thread than the one feeding the task, so implementations keep
/// their state behind interior mutability and must be `Send + Sync`.
pub trait DiagnosticTask: Send + Sync {
    /// Name carried by every record this task produces.
    fn name(&self) -> &str;

    /// Build a fresh record from the current state.
    fn evaluate(&self) -> StatusRecord;
}

/// The sink that polls registered tasks.
///
/// Registration is the only call this crate makes into a reporter; the
/// reporter decides when to evaluate and where the records go.
pub trait Reporter {
    fn register(&self, task: Arc<dyn DiagnosticTask>) -> Result<()>;
}

/// A task that folds several child tasks into one record.
///
/// Children are evaluated in the order they were added. The merged level
/// is the worst child level, problem messages are joined with `"; "` (OK
/// messages only appear when every child is OK), and all facts are
/// concatenated in child order.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use diagwatch_sdk::{CompositeTask, DiagnosticTask, FnTask, Level, StatusRecord};
///
/// let mut composite = CompositeTask::new("drive status");
/// composite.add_task(Arc::new(FnTask::new("left", |r: &mut StatusRecord| {
///     r.summary(Level::Ok, "spinning")
/// })));
/// composite.add_task(Arc::new(FnTask::new("right", |r: &mut StatusRecord| {
///     r.summary(Level::Error, "stalled")
/// })));
///
/// let record = composite.evaluate();
/// assert_eq!(record.level, Level::Error);
/// assert_eq!(record.message, "stalled");
/// ```
pub struct CompositeTask {
    name: String,
    children: Vec<Arc<dyn DiagnosticTask>>,
}

impl CompositeTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child. Children cannot be removed.
    pub fn add_task(&mut self, task: Arc<dyn DiagnosticTask>) {
        if self.children.iter().any(|c| c.name() == task.name()) {
            warn!(
                composite = %self.name,
                child = task.name(),
                "duplicate child task name"
            );
        }
        self.children.push(task);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl DiagnosticTask for CompositeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self) -> StatusRecord {
        let mut record = StatusRecord::new(self.name.clone());
        for child in &self.children {
            let child = child.evaluate();
            // OK children contribute their level and facts, never text
            let message = if child.level.is_problem() {
                child.message.as_str()
            } else {
                ""
            };
            record.merge_summary(child.level, message);
            record.values.extend(child.values);
        }
        record
    }
}

impl fmt::Debug for CompositeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<&str> = self.children.iter().map(|c| c.name()).collect();
        f.debug_struct("CompositeTask")
            .field("name", &self.name)
            .field("children", &children)
            .finish()
    }
}

/// A task backed by a closure that fills in the record.
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> FnTask<F>
where
    F: Fn(&mut StatusRecord) + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> DiagnosticTask for FnTask<F>
where
    F: Fn(&mut StatusRecord) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self) -> StatusRecord {
        let mut record = StatusRecord::new(self.name.clone());
        (self.f)(&mut record);
        record
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagwatch_types::Level;

    fn fixed(name: &str, level: Level, message: &'static str) -> Arc<dyn DiagnosticTask> {
        Arc::new(FnTask::new(name, move |r: &mut StatusRecord| {
            r.summary(level, message);
            r.add("source", message);
        }))
    }

    #[test]
    fn fn_task_fills_record() {
        let task = FnTask::new("battery", |r: &mut StatusRecord| {
            r.summary(Level::Warn, "Battery low");
            r.add("Charge (%)", 14);
        });

        let record = task.evaluate();
        assert_eq!(record.name, "battery");
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.value("Charge (%)"), Some("14"));
    }

    #[test]
    fn ok_and_error_child_yields_error_message_only() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("freq", Level::Ok, "Desired frequency met"));
        composite.add_task(fixed("stamp", Level::Error, "Timestamps too far in past seen."));

        let record = composite.evaluate();
        assert_eq!(record.name, "topic");
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.message, "Timestamps too far in past seen.");
    }

    #[test]
    fn equal_severity_messages_are_concatenated() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("a", Level::Warn, "first"));
        composite.add_task(fixed("b", Level::Warn, "second"));

        let record = composite.evaluate();
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.message, "first; second");
    }

    #[test]
    fn stale_ranks_above_warn_below_error() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("a", Level::Warn, "warn"));
        composite.add_task(fixed("b", Level::Stale, "stale"));
        assert_eq!(composite.evaluate().level, Level::Stale);

        composite.add_task(fixed("c", Level::Error, "error"));
        assert_eq!(composite.evaluate().level, Level::Error);
    }

    #[test]
    fn all_ok_children_contribute_no_text() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("a", Level::Ok, "Desired frequency met"));
        composite.add_task(fixed("b", Level::Ok, "Timestamps are reasonable."));

        let record = composite.evaluate();
        assert_eq!(record.level, Level::Ok);
        assert!(record.message.is_empty());
        // facts still survive
        let sources: Vec<&str> = record.values_for("source").collect();
        assert_eq!(sources, vec!["Desired frequency met", "Timestamps are reasonable."]);
    }

    #[test]
    fn ok_child_between_problems_adds_no_text() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("a", Level::Warn, "first"));
        composite.add_task(fixed("b", Level::Ok, "fine"));
        composite.add_task(fixed("c", Level::Warn, "second"));

        let record = composite.evaluate();
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.message, "first; second");
    }

    #[test]
    fn facts_concatenate_in_child_order() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("a", Level::Ok, "one"));
        composite.add_task(fixed("b", Level::Error, "two"));
        composite.add_task(fixed("c", Level::Ok, "three"));

        let record = composite.evaluate();
        let sources: Vec<&str> = record.values_for("source").collect();
        assert_eq!(sources, vec!["one", "two", "three"]);
    }

    #[test]
    fn empty_composite_is_ok() {
        let composite = CompositeTask::new("empty");
        assert!(composite.is_empty());
        let record = composite.evaluate();
        assert_eq!(record.level, Level::Ok);
        assert!(record.values.is_empty());
    }

    #[test]
    fn duplicate_names_are_kept() {
        let mut composite = CompositeTask::new("topic");
        composite.add_task(fixed("same", Level::Ok, "a"));
        composite.add_task(fixed("same", Level::Ok, "b"));
        assert_eq!(composite.len(), 2);
    }
}
