//! Scenario runner with progress tracking.
//!
//! Scenarios run one at a time in table order. Progress lives behind an
//! `RwLock` so that a server can report it while a run is in flight; the
//! lock is never held across a pipeline call.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunnerSettings;
use crate::error::RunnerError;
use crate::handler::VoiceDetectionHandler;
use crate::scenario::{ObservedStatus, Scenario};
use crate::types::ClassificationSuccess;

const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle of a full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Lifecycle of one scenario within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioState {
    Pending,
    Executing,
    Passed,
    Failed,
}

/// Runner status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl RunStatus {
    fn idle() -> Self {
        Self {
            state: RunState::Idle,
            started_at: None,
            finished_at: None,
            duration: None,
        }
    }
}

/// Result of running one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub id: String,
    pub passed: bool,
    pub observed_status: ObservedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_result: Option<ClassificationSuccess>,
    pub duration_ms: u64,
}

/// Aggregate counts, derived from the recorded outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Per-scenario progress entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProgress {
    pub id: String,
    pub name: String,
    pub state: ScenarioState,
}

/// Snapshot of a run in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub status: RunStatus,
    pub stats: RunStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    pub scenarios: Vec<ScenarioProgress>,
}

/// Full run report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: String,
    pub endpoint: String,
    #[serde(flatten)]
    pub stats: RunStats,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.stats.executed == self.stats.total && self.stats.failed == 0
    }
}

/// Sequential scenario runner.
#[derive(Clone)]
pub struct ScenarioRunner {
    handler: Arc<VoiceDetectionHandler>,
    scenarios: Arc<[Scenario]>,
    pacing: Duration,
    timeout: Duration,
    inner: Arc<RwLock<RunnerInner>>,
}

struct RunnerInner {
    status: RunStatus,
    current: Option<String>,
    outcomes: HashMap<String, ScenarioOutcome>,
}

/// Closes the run if the run task ends without finishing (aborted or
/// runtime shutdown).
struct RunGuard {
    inner: Arc<RwLock<RunnerInner>>,
    start_time: DateTime<Utc>,
    armed: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let start_time = self.start_time;
        let close = move |inner: &mut RunnerInner| {
            inner.status = finished_status(start_time, Utc::now());
            inner.current = None;
        };

        let closed = match self.inner.try_write() {
            Ok(mut inner) => {
                close(&mut *inner);
                true
            }
            Err(_) => false,
        };
        if !closed {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let inner = self.inner.clone();
                handle.spawn(async move { close(&mut *inner.write().await) });
            }
        }
        warn!("scenario run interrupted before completion");
    }
}

impl ScenarioRunner {
    /// Create a runner over a fixed scenario table.
    pub fn new(handler: VoiceDetectionHandler, scenarios: Vec<Scenario>) -> Self {
        Self {
            handler: Arc::new(handler),
            scenarios: scenarios.into(),
            pacing: Duration::ZERO,
            timeout: DEFAULT_SCENARIO_TIMEOUT,
            inner: Arc::new(RwLock::new(RunnerInner {
                status: RunStatus::idle(),
                current: None,
                outcomes: HashMap::new(),
            })),
        }
    }

    /// Delay before each scenario.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Upper bound on a single scenario.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settings(self, settings: &RunnerSettings) -> Self {
        self.with_pacing(settings.pacing())
            .with_timeout(settings.scenario_timeout())
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn endpoint(&self) -> &str {
        self.handler.endpoint()
    }

    /// Get current status.
    pub async fn status(&self) -> RunStatus {
        self.inner.read().await.status.clone()
    }

    /// Get aggregate counts for the current run.
    pub async fn stats(&self) -> RunStats {
        let inner = self.inner.read().await;
        self.stats_of(&inner)
    }

    /// State of one scenario, or `None` for an unknown id.
    pub async fn scenario_state(&self, id: &str) -> Option<ScenarioState> {
        if !self.scenarios.iter().any(|s| s.id == id) {
            return None;
        }
        let inner = self.inner.read().await;
        Some(state_of(&inner, id))
    }

    /// Outcome recorded for one scenario in the current run.
    pub async fn outcome(&self, id: &str) -> Option<ScenarioOutcome> {
        self.inner.read().await.outcomes.get(id).cloned()
    }

    /// Progress snapshot.
    pub async fn progress(&self) -> RunProgress {
        let inner = self.inner.read().await;
        RunProgress {
            status: inner.status.clone(),
            stats: self.stats_of(&inner),
            current: inner.current.clone(),
            scenarios: self
                .scenarios
                .iter()
                .map(|s| ScenarioProgress {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    state: state_of(&inner, &s.id),
                })
                .collect(),
        }
    }

    /// Report for the current run (partial while running).
    pub async fn report(&self) -> RunReport {
        let inner = self.inner.read().await;
        self.report_of(&inner)
    }

    /// Run every scenario in table order and wait for the report.
    ///
    /// Previous outcomes are discarded when the run starts. Returns
    /// [`RunnerError::AlreadyRunning`] if another run is in progress.
    /// The run itself executes in a background task, so dropping this
    /// future does not leave the runner stuck in `Running`.
    pub async fn run_all(&self) -> Result<RunReport, RunnerError> {
        let task = self.start().await?;
        task.await.map_err(|e| RunnerError::Interrupted(e.to_string()))
    }

    /// Start a run in the background.
    ///
    /// The `Idle`/`Completed` to `Running` transition happens under a single
    /// write lock, so of two concurrent callers exactly one succeeds.
    pub async fn start(&self) -> Result<JoinHandle<RunReport>, RunnerError> {
        let start_time = Utc::now();

        {
            let mut inner = self.inner.write().await;
            if inner.status.state == RunState::Running {
                return Err(RunnerError::AlreadyRunning);
            }
            inner.status = RunStatus {
                state: RunState::Running,
                started_at: Some(start_time.to_rfc3339()),
                finished_at: None,
                duration: None,
            };
            inner.outcomes = HashMap::new();
            inner.current = None;
        }

        let runner = self.clone();
        let mut guard = RunGuard {
            inner: self.inner.clone(),
            start_time,
            armed: true,
        };
        Ok(tokio::spawn(async move {
            let report = runner.execute(start_time).await;
            guard.armed = false;
            report
        }))
    }

    async fn execute(&self, start_time: DateTime<Utc>) -> RunReport {
        info!(
            endpoint = self.handler.endpoint(),
            scenarios = self.scenarios.len(),
            "scenario run started"
        );

        for scenario in self.scenarios.iter() {
            self.inner.write().await.current = Some(scenario.id.clone());

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let outcome = self.run_scenario(scenario).await;
            if outcome.passed {
                debug!(id = %outcome.id, status = %outcome.observed_status, "scenario passed");
            } else {
                warn!(
                    id = %outcome.id,
                    expected = %scenario.expectation(),
                    status = %outcome.observed_status,
                    message = outcome.observed_message.as_deref().unwrap_or(""),
                    "scenario failed"
                );
            }

            let mut inner = self.inner.write().await;
            inner.outcomes.insert(outcome.id.clone(), outcome);
            inner.current = None;
        }

        let end_time = Utc::now();
        let report = {
            let mut inner = self.inner.write().await;
            inner.status = finished_status(start_time, end_time);
            self.report_of(&inner)
        };

        info!(
            total = report.stats.total,
            passed = report.stats.passed,
            failed = report.stats.failed,
            "scenario run completed"
        );
        report
    }

    /// Run one scenario in its own task so a fault cannot abort the run.
    async fn run_scenario(&self, scenario: &Scenario) -> ScenarioOutcome {
        let start = Instant::now();

        let handler = self.handler.clone();
        let headers = scenario.headers.clone();
        let body = scenario.body.clone();
        let mut task = tokio::spawn(async move { handler.handle(&headers, &body).await });

        let (observed_status, observed_message, observed_result) =
            match tokio::time::timeout(self.timeout, &mut task).await {
                Ok(Ok(envelope)) => (
                    ObservedStatus::of(&envelope),
                    envelope.message().map(str::to_string),
                    envelope.success().cloned(),
                ),
                Ok(Err(e)) => {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    (ObservedStatus::Exception, Some(message), None)
                }
                Err(_) => {
                    task.abort();
                    (
                        ObservedStatus::Exception,
                        Some(format!("Scenario timeout ({}s)", self.timeout.as_secs())),
                        None,
                    )
                }
            };

        let passed = scenario.check(observed_status, observed_message.as_deref());

        ScenarioOutcome {
            id: scenario.id.clone(),
            passed,
            observed_status,
            observed_message,
            observed_result,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn stats_of(&self, inner: &RunnerInner) -> RunStats {
        let executed = inner.outcomes.len();
        let passed = inner.outcomes.values().filter(|o| o.passed).count();
        RunStats {
            total: self.scenarios.len(),
            executed,
            passed,
            failed: executed - passed,
        }
    }

    fn report_of(&self, inner: &RunnerInner) -> RunReport {
        RunReport {
            timestamp: inner
                .status
                .started_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            endpoint: self.handler.endpoint().to_string(),
            stats: self.stats_of(inner),
            outcomes: self
                .scenarios
                .iter()
                .filter_map(|s| inner.outcomes.get(&s.id).cloned())
                .collect(),
        }
    }
}

fn state_of(inner: &RunnerInner, id: &str) -> ScenarioState {
    if inner.current.as_deref() == Some(id) {
        return ScenarioState::Executing;
    }
    match inner.outcomes.get(id) {
        Some(o) if o.passed => ScenarioState::Passed,
        Some(_) => ScenarioState::Failed,
        None => ScenarioState::Pending,
    }
}

fn finished_status(start: DateTime<Utc>, end: DateTime<Utc>) -> RunStatus {
    RunStatus {
        state: RunState::Completed,
        started_at: Some(start.to_rfc3339()),
        finished_at: Some(end.to_rfc3339()),
        duration: Some(format!(
            "{}ms",
            end.signed_duration_since(start).num_milliseconds()
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

/// Save report to file.
pub fn save_report(report: &RunReport, path: &Path) -> Result<()> {
    let data = serde_json::to_string_pretty(report)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Print run summary.
pub fn print_summary(scenarios: &[Scenario], report: &RunReport) {
    println!("\n{}", "=".repeat(96));
    println!("SCENARIO SUMMARY  {}", report.endpoint);
    println!("{}", "=".repeat(96));

    println!(
        "\n{:<5} {:<11} {:<40} {:<10} {:>8}  {}",
        "ID", "Category", "Name", "Status", "Time(ms)", "Result"
    );
    println!("{}", "-".repeat(96));

    for outcome in &report.outcomes {
        let Some(scenario) = scenarios.iter().find(|s| s.id == outcome.id) else {
            continue;
        };
        println!(
            "{:<5} {:<11} {:<40} {:<10} {:>8}  {}",
            outcome.id,
            scenario.category.to_string(),
            scenario.name,
            outcome.observed_status.as_str(),
            outcome.duration_ms,
            if outcome.passed { "PASS" } else { "FAIL" }
        );
        if !outcome.passed {
            println!("      expected: {}", scenario.expectation());
            match &outcome.observed_message {
                Some(m) => println!(
                    "      actual:   status \"{}\" - message: \"{}\"",
                    outcome.observed_status, m
                ),
                None => println!("      actual:   status \"{}\"", outcome.observed_status),
            }
        } else if let Some(r) = &outcome.observed_result {
            println!(
                "      confirmed: {} (confidence: {})",
                r.classification, r.confidence_score
            );
        }
    }
    println!("{}", "-".repeat(96));
    println!(
        "Total: {}  Passed: {}  Failed: {}",
        report.stats.total, report.stats.passed, report.stats.failed
    );
}
