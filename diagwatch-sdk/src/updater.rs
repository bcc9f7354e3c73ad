//! The Updater: an in-process reporter for diagnostic tasks.

use std::sync::Arc;
use std::time::Duration;

use diagwatch_types::Report;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::Settings;
use crate::error::{DiagnosticError, Result};
use crate::output::Output;
use crate::task::{DiagnosticTask, Reporter};

type TaskList = RwLock<Vec<Arc<dyn DiagnosticTask>>>;

/// Evaluates registered tasks and emits their records as reports.
///
/// Each cycle every task is evaluated once, in registration order, and
/// the records are collected into a [`Report`] for the configured outputs.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use diagwatch_sdk::{FrequencyConfig, Output, TopicDiagnostic, Updater};
///
/// #[tokio::main]
/// async fn main() -> Result<(), diagwatch_sdk::DiagnosticError> {
///     let updater = Updater::builder()
///         .hardware_id("robot-7")
///         .output(Output::file("diagnostics.json"))
///         .period(Duration::from_secs(1))
///         .build();
///
///     let odom = Arc::new(TopicDiagnostic::headerless("odom", FrequencyConfig::new(45.0, 55.0))?);
///     odom.attach(&updater)?;
///
///     // Start background emission
///     let _emission = updater.start();
///
///     loop {
///         odom.tick();
///         tokio::time::sleep(Duration::from_millis(20)).await;
///     }
/// }
/// ```
pub struct Updater {
    tasks: Arc<TaskList>,
    outputs: Arc<Vec<Output>>,
    period: Duration,
    hardware_id: Arc<str>,
}

impl Updater {
    /// Create an updater with no outputs, a one second period and no
    /// hardware id.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the updater.
    pub fn builder() -> UpdaterBuilder {
        UpdaterBuilder::new()
    }

    /// Create an updater, and a diagnostic for every configured topic.
    ///
    /// The topic diagnostics are attached before being returned, in topic
    /// name order.
    pub fn from_settings(
        settings: &Settings,
        outputs: impl IntoIterator<Item = Output>,
    ) -> Result<(Self, Vec<Arc<crate::TopicDiagnostic>>)> {
        let mut builder = Self::builder()
            .hardware_id(settings.hardware_id.clone())
            .period(settings.period());
        for output in outputs {
            builder = builder.output(output);
        }
        let updater = builder.build();

        let mut diagnostics = Vec::with_capacity(settings.topics.len());
        for topic in settings.topics.keys() {
            let diagnostic = Arc::new(settings.topic_diagnostic(topic)?);
            diagnostic.attach(&updater)?;
            diagnostics.push(diagnostic);
        }
        Ok((updater, diagnostics))
    }

    /// Remove a task by name.
    ///
    /// Returns `true` if the task was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|t| t.name() != name);
        tasks.len() != before
    }

    /// Names of registered tasks, in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.read().iter().map(|t| t.name().to_string()).collect()
    }

    /// Evaluate every task now.
    ///
    /// Useful when a host drives the reporting cycle itself rather than
    /// using background emission.
    pub fn collect(&self) -> Report {
        collect_report(&self.tasks, &self.hardware_id)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    /// Start background emission of reports.
    ///
    /// This spawns a tokio task that collects and emits a report every
    /// period. Returns a handle that can be used to stop the emission.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> EmissionHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = self.tasks.clone();
        let outputs = self.outputs.clone();
        let hardware_id = self.hardware_id.clone();
        let period = self.period;

        tracing::info!(period_ms = period.as_millis() as u64, "starting diagnostic updates");

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let report = collect_report(&tasks, &hardware_id);
                        emit(&outputs, &report).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("diagnostic updates stopped");
        });

        EmissionHandle { stop_tx }
    }

    /// Collect and emit a report to all outputs immediately.
    #[cfg(feature = "tokio")]
    pub async fn force_update(&self) -> Report {
        let report = self.collect();
        emit(&self.outputs, &report).await;
        report
    }
}

impl Reporter for Updater {
    fn register(&self, task: Arc<dyn DiagnosticTask>) -> Result<()> {
        let mut tasks = self.tasks.write();
        if tasks.iter().any(|t| t.name() == task.name()) {
            return Err(DiagnosticError::DuplicateTask(task.name().to_string()));
        }
        debug!(task = task.name(), "registered diagnostic task");
        tasks.push(task);
        Ok(())
    }
}

impl Default for Updater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("tasks", &self.task_names())
            .field("outputs", &self.outputs)
            .field("period", &self.period)
            .field("hardware_id", &self.hardware_id)
            .finish()
    }
}

fn collect_report(tasks: &TaskList, hardware_id: &str) -> Report {
    // Evaluate outside the lock so a slow task cannot block registration
    let tasks: Vec<Arc<dyn DiagnosticTask>> = tasks.read().clone();
    Report::builder()
        .hardware_id(hardware_id)
        .statuses(tasks.iter().map(|t| t.evaluate()))
        .build()
}

#[cfg(feature = "tokio")]
async fn emit(outputs: &[Output], report: &Report) {
    for output in outputs {
        if let Err(e) = output.emit(report).await {
            tracing::warn!(error = %e, ?output, "failed to emit diagnostics report");
        }
    }
}

/// Builder for configuring an Updater.
#[derive(Debug, Default)]
pub struct UpdaterBuilder {
    outputs: Vec<Output>,
    period: Option<Duration>,
    hardware_id: String,
}

impl UpdaterBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; reports will be emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the reporting period.
    ///
    /// Defaults to 1 second if not specified.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Identify the host in every report.
    pub fn hardware_id(mut self, id: impl Into<String>) -> Self {
        self.hardware_id = id.into();
        self
    }

    /// Build the updater.
    pub fn build(self) -> Updater {
        Updater {
            tasks: Arc::new(RwLock::new(Vec::new())),
            outputs: Arc::new(self.outputs),
            period: self.period.unwrap_or(Duration::from_secs(1)),
            hardware_id: Arc::from(self.hardware_id),
        }
    }
}

/// Handle for controlling background emission.
///
/// Drop this handle to stop emission, or call `stop()` explicitly.
#[cfg(feature = "tokio")]
pub struct EmissionHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
}

#[cfg(feature = "tokio")]
impl EmissionHandle {
    /// Stop background emission.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;
    use diagwatch_types::{Level, StatusRecord};

    fn task(name: &str, level: Level) -> Arc<dyn DiagnosticTask> {
        Arc::new(FnTask::new(name, move |r: &mut StatusRecord| {
            r.summary(level, level.as_str())
        }))
    }

    #[test]
    fn defaults() {
        let updater = Updater::new();
        assert_eq!(updater.period(), Duration::from_secs(1));
        assert_eq!(updater.hardware_id(), "");
        assert!(updater.outputs.is_empty());
        assert!(updater.collect().is_empty());
    }

    #[test]
    fn test_builder() {
        let updater = Updater::builder()
            .output(Output::file("test.json"))
            .output(Output::file("other.json"))
            .period(Duration::from_millis(500))
            .hardware_id("robot")
            .build();

        assert_eq!(updater.period(), Duration::from_millis(500));
        assert_eq!(updater.outputs.len(), 2);
        assert_eq!(updater.collect().hardware_id, "robot");
    }

    #[test]
    fn collect_evaluates_in_registration_order() {
        let updater = Updater::new();
        updater.register(task("b", Level::Ok)).unwrap();
        updater.register(task("a", Level::Error)).unwrap();

        let report = updater.collect();
        let names: Vec<&str> = report.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(report.worst_level(), Level::Error);
        assert_eq!(report.get("a").unwrap().message, "ERROR");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let updater = Updater::new();
        updater.register(task("camera", Level::Ok)).unwrap();

        let err = updater.register(task("camera", Level::Warn)).unwrap_err();
        assert!(matches!(err, DiagnosticError::DuplicateTask(name) if name == "camera"));
        assert_eq!(updater.task_names(), vec!["camera".to_string()]);
    }

    #[test]
    fn unregister_removes_task() {
        let updater = Updater::new();
        updater.register(task("camera", Level::Ok)).unwrap();
        updater.register(task("lidar", Level::Ok)).unwrap();

        assert!(updater.unregister("camera"));
        assert!(!updater.unregister("camera"));
        assert_eq!(updater.task_names(), vec!["lidar".to_string()]);

        // name is free again
        updater.register(task("camera", Level::Ok)).unwrap();
    }

    #[test]
    fn from_settings_attaches_every_topic() {
        let settings = Settings::from_toml(
            r#"
            hardware_id = "robot-7"
            period_secs = 0.25

            [topics.odom.frequency]
            min_rate = 45.0
            max_rate = 55.0

            [topics.camera.frequency]
            min_rate = 25.0
            max_rate = 35.0

            [topics.camera.timestamp]
            max_acceptable = 0.5
            "#,
        )
        .unwrap();

        let (updater, diagnostics) = Updater::from_settings(&settings, Vec::new()).unwrap();
        assert_eq!(updater.period(), Duration::from_millis(250));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            updater.task_names(),
            vec!["camera topic status".to_string(), "odom topic status".to_string()]
        );

        let report = updater.collect();
        assert_eq!(report.hardware_id, "robot-7");
        assert_eq!(report.len(), 2);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn force_update_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostics.json");

        let updater = Updater::builder()
            .hardware_id("bench")
            .output(Output::file(&path))
            .build();
        updater.register(task("camera", Level::Warn)).unwrap();

        let report = updater.force_update().await;

        let json = std::fs::read_to_string(&path).unwrap();
        let written: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(written, report);
        assert_eq!(written.get("camera").unwrap().level, Level::Warn);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn start_emits_periodically_until_stopped() {
        let (output, mut rx) = Output::channel(16);
        let updater = Updater::builder()
            .output(output)
            .period(Duration::from_millis(10))
            .build();
        updater.register(task("camera", Level::Ok)).unwrap();

        let handle = updater.start();

        for _ in 0..2 {
            let report = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("report within timeout")
                .expect("channel open");
            assert_eq!(report.len(), 1);
        }

        handle.stop();
    }
}
