use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::config::PipelineConfig;
use db::Repositories;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::client::QuestionSource;
use crate::error::PipelineError;
use crate::loader::{LoadSummary, Loader};
use crate::metrics;
use crate::verifier::{SampleRecord, Verifier};
use crate::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Truncate,
    FetchAndLoad,
    VerifyRead,
}

impl Step {
    pub const fn name(self) -> &'static str {
        match self {
            Step::Truncate => "truncate",
            Step::FetchAndLoad => "fetch_and_load",
            Step::VerifyRead => "verify_read",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("step {0} declared twice")]
    Duplicate(Step),
    #[error("step {step} depends on undeclared step {predecessor}")]
    UnknownPredecessor { step: Step, predecessor: Step },
    #[error("task graph has a cycle through {0:?}")]
    Cycle(Vec<Step>),
}

impl GraphError {
    /// The step the graph problem was detected at.
    pub fn step(&self) -> Step {
        match self {
            GraphError::Duplicate(step) => *step,
            GraphError::UnknownPredecessor { step, .. } => *step,
            GraphError::Cycle(steps) => steps.first().copied().unwrap_or(Step::Truncate),
        }
    }
}

/// Named steps with declared predecessors, walked in topological order.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<(Step, Vec<Step>)>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `truncate` → `fetch_and_load` → `verify_read`.
    pub fn standard() -> Self {
        Self::new()
            .step(Step::Truncate, &[])
            .step(Step::FetchAndLoad, &[Step::Truncate])
            .step(Step::VerifyRead, &[Step::FetchAndLoad])
    }

    pub fn step(mut self, step: Step, predecessors: &[Step]) -> Self {
        self.nodes.push((step, predecessors.to_vec()));
        self
    }

    pub fn predecessors(&self, step: Step) -> &[Step] {
        self.nodes
            .iter()
            .find(|(candidate, _)| *candidate == step)
            .map(|(_, preds)| preds.as_slice())
            .unwrap_or_default()
    }

    /// Kahn's algorithm; ties resolve in declaration order.
    pub fn topological_order(&self) -> Result<Vec<Step>, GraphError> {
        let mut pending: HashMap<Step, usize> = HashMap::new();
        for (step, _) in &self.nodes {
            if pending.insert(*step, 0).is_some() {
                return Err(GraphError::Duplicate(*step));
            }
        }
        for (step, preds) in &self.nodes {
            for predecessor in preds {
                if !pending.contains_key(predecessor) {
                    return Err(GraphError::UnknownPredecessor {
                        step: *step,
                        predecessor: *predecessor,
                    });
                }
            }
            if let Some(count) = pending.get_mut(step) {
                *count = preds.len();
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let ready = self
                .nodes
                .iter()
                .map(|(step, _)| *step)
                .find(|step| pending.get(step) == Some(&0) && !order.contains(step));
            let Some(next) = ready else {
                let stuck = self
                    .nodes
                    .iter()
                    .map(|(step, _)| *step)
                    .filter(|step| !order.contains(step))
                    .collect();
                return Err(GraphError::Cycle(stuck));
            };
            order.push(next);
            for (step, preds) in &self.nodes {
                let satisfied = preds.iter().filter(|pred| **pred == next).count();
                if let Some(count) = pending.get_mut(step) {
                    *count -= satisfied;
                }
            }
        }
        Ok(order)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Truncated,
    Loaded(LoadSummary),
    Verified(Vec<SampleRecord>),
}

/// The step that failed during a graph walk and the steps that completed before it.
#[derive(Debug, Error)]
#[error("step {step} failed: {error}")]
pub struct StepFailure {
    pub step: Step,
    pub completed: Vec<Step>,
    #[source]
    pub error: PipelineError,
}

pub struct Pipeline {
    source: Arc<dyn QuestionSource>,
    loader: Loader,
    verifier: Verifier,
    settings: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        settings: PipelineConfig,
        source: Arc<dyn QuestionSource>,
        repos: Arc<dyn Repositories>,
    ) -> Self {
        Self {
            source,
            loader: Loader::new(repos.clone()),
            verifier: Verifier::new(repos, settings.sample_limit),
            settings,
        }
    }

    pub async fn truncate(&self) -> Result<(), PipelineError> {
        self.loader.reset_store().await?;
        Ok(())
    }

    pub async fn fetch_and_load(&self) -> Result<LoadSummary, PipelineError> {
        self.fetch_and_load_at(Utc::now()).await
    }

    /// Window is derived from `now`; the store must already be truncated.
    #[instrument(skip(self), fields(tag = %self.settings.tag))]
    pub async fn fetch_and_load_at(&self, now: DateTime<Utc>) -> Result<LoadSummary, PipelineError> {
        let window = TimeWindow::from_config(now, &self.settings)?;
        info!(
            from = %window.from,
            to = %window.to,
            "fetching questions"
        );
        let batch = self.source.fetch(&self.settings.tag, window).await?;
        if let Some(quota) = batch.quota_remaining {
            metrics::API_QUOTA_REMAINING.set(quota);
        }
        self.loader.load(batch).await
    }

    pub async fn verify_read(&self) -> Result<Vec<SampleRecord>, PipelineError> {
        Ok(self.verifier.verify().await?)
    }

    pub async fn run_step(&self, step: Step) -> Result<StepOutcome, PipelineError> {
        let started = Instant::now();
        let result = match step {
            Step::Truncate => self.truncate().await.map(|_| StepOutcome::Truncated),
            Step::FetchAndLoad => self.fetch_and_load().await.map(StepOutcome::Loaded),
            Step::VerifyRead => self.verify_read().await.map(StepOutcome::Verified),
        };
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::STEP_OUTCOMES_TOTAL
            .with_label_values(&[step.name(), outcome])
            .inc();
        metrics::STEP_DURATION_SECONDS
            .with_label_values(&[step.name()])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    /// Runs every step once in dependency order and stops at the first failure.
    pub async fn run(&self, graph: &TaskGraph) -> Result<Vec<(Step, StepOutcome)>, StepFailure> {
        let order = graph.topological_order().map_err(|err| StepFailure {
            step: err.step(),
            completed: Vec::new(),
            error: err.into(),
        })?;

        let mut outcomes = Vec::with_capacity(order.len());
        for step in order {
            info!(step = %step, "starting step");
            match self.run_step(step).await {
                Ok(outcome) => outcomes.push((step, outcome)),
                Err(err) => {
                    error!(step = %step, error = %err, transient = err.is_transient(), "step failed");
                    return Err(StepFailure {
                        step,
                        completed: outcomes.into_iter().map(|(done, _)| done).collect(),
                        error: err,
                    });
                }
            }
        }
        metrics::LAST_SUCCESS_TIMESTAMP.set(Utc::now().timestamp());
        Ok(outcomes)
    }
}
