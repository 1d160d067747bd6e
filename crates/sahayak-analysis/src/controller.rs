//! Application-state controller and the concurrent analysis orchestrator.

use std::sync::Arc;
use std::time::Instant;

use futures::future;
use tokio::sync::RwLock;
use tracing::{info, warn};

use sahayak_common::catalog::Catalog;
use sahayak_common::profile::{FarmerProfile, PartialProfile};

use crate::evaluate::{EligibilityResult, EvaluationError, Evaluator};
use crate::metrics::DashboardMetrics;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The profile is missing required fields; no remote calls were issued.
    #[error("profile incomplete: {0}")]
    Validation(String),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// All shared mutable state: the working profile, the last complete result
/// set, and the dashboard metrics. One controller owns it; every mutation
/// goes through the write lock, so readers never observe a half-applied run.
#[derive(Debug)]
pub struct AppState {
    pub profile: FarmerProfile,
    pub results: Vec<EligibilityResult>,
    pub metrics: DashboardMetrics,
}

pub struct AnalysisController<E> {
    state: Arc<RwLock<AppState>>,
    evaluator: E,
    catalog: Arc<Catalog>,
}

impl<E: Evaluator> AnalysisController<E> {
    pub fn new(evaluator: E, catalog: Arc<Catalog>) -> Self {
        let state = AppState {
            profile: FarmerProfile::default(),
            results: Vec::new(),
            metrics: DashboardMetrics::new(catalog.len()),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            evaluator,
            catalog,
        }
    }

    /// The single mutation path for the profile. Voice extraction results
    /// and manual form edits both land here.
    pub async fn merge_profile(&self, partial: PartialProfile) -> FarmerProfile {
        let mut state = self.state.write().await;
        state.profile.merge(partial);
        state.profile.clone()
    }

    pub async fn profile(&self) -> FarmerProfile {
        self.state.read().await.profile.clone()
    }

    pub async fn results(&self) -> Vec<EligibilityResult> {
        self.state.read().await.results.clone()
    }

    pub async fn metrics(&self) -> DashboardMetrics {
        self.state.read().await.metrics.clone()
    }

    /// Run one eligibility check of the current profile against every
    /// catalog program concurrently.
    ///
    /// All-or-nothing: every evaluator call runs to completion, and if any
    /// of them failed the stored results and metrics are left untouched so
    /// the dashboard never mixes old and new data. On success the result
    /// list is replaced wholesale, in catalog order.
    pub async fn run_analysis(&self) -> Result<Vec<EligibilityResult>, AnalysisError> {
        let profile = self.profile().await;
        validate(&profile)?;

        let started = Instant::now();
        let calls = self
            .catalog
            .programs()
            .iter()
            .map(|program| self.evaluator.evaluate(&profile, &program.id));
        // join_all: all calls in flight at once, none cancelled, output
        // order matches catalog order regardless of completion order.
        let settled = future::join_all(calls).await;

        let mut results = Vec::with_capacity(settled.len());
        for outcome in settled {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(error = %e, "analysis run failed, discarding batch");
                    return Err(e.into());
                }
            }
        }

        let elapsed = started.elapsed();
        let eligible_count = results.iter().filter(|r| r.is_eligible).count();

        let mut state = self.state.write().await;
        state.metrics.record_run(elapsed, eligible_count);
        state.results = results.clone();
        info!(
            programs = results.len(),
            eligible_count,
            elapsed_ms = elapsed.as_millis(),
            "analysis run complete"
        );
        Ok(results)
    }
}

fn validate(profile: &FarmerProfile) -> Result<(), AnalysisError> {
    let filled = |field: &Option<String>| {
        field.as_deref().is_some_and(|v| !v.trim().is_empty())
    };
    if !filled(&profile.name) {
        return Err(AnalysisError::Validation("name is required".to_string()));
    }
    if !filled(&profile.state) {
        return Err(AnalysisError::Validation("state is required".to_string()));
    }
    Ok(())
}
