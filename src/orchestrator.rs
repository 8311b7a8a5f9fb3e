//! Scenario Orchestrator: the crate's top-level entry point,
//! running a whole scenario or a single stage through the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::pipeline::{Pipeline, StageExecutionContext};
use crate::registry::ScenarioRegistry;
use crate::runtime::CompletionResult;

/// Runs scenarios and individual stages against a `ScenarioRegistry` and a
/// `Pipeline`. Stages within a scenario run sequentially: a later stage's
/// placeholder resolution may depend on an earlier stage's persisted output.
pub struct ScenarioOrchestrator {
    registry: Arc<ScenarioRegistry>,
    pipeline: Arc<Pipeline>,
}

impl ScenarioOrchestrator {
    pub fn new(registry: Arc<ScenarioRegistry>, pipeline: Arc<Pipeline>) -> Self {
        Self { registry, pipeline }
    }

    /// Runs every stage of `scenarioName` in declared order, returning one
    /// result list per stage.
    pub async fn execute_scenario(
        &self,
        session_id: &str,
        scenario_name: &str,
        ct: &CancellationToken,
    ) -> Result<Vec<Vec<CompletionResult>>, OrchestratorError> {
        let scenario = self.registry.get_scenario(scenario_name).await?;

        let mut outputs = Vec::with_capacity(scenario.stages.len());
        for stage in scenario.stages {
            let ctx = StageExecutionContext::new(session_id, stage, HashMap::new(), ct.clone());
            let ctx = self.pipeline.run(ctx).await.map_err(OrchestratorError::from)?;
            outputs.push(ctx.results);
        }
        Ok(outputs)
    }

    /// Runs a single stage of `scenarioName` identified by `stageId`.
    pub async fn execute_stage(
        &self,
        session_id: &str,
        scenario_name: &str,
        stage_id: i64,
        ct: &CancellationToken,
    ) -> Result<Vec<CompletionResult>, OrchestratorError> {
        let scenario = self.registry.get_scenario(scenario_name).await?;
        let stage = scenario
            .stages
            .into_iter()
            .find(|s| s.id == stage_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("stage not found: {stage_id}")))?;

        let ctx = StageExecutionContext::new(session_id, stage, HashMap::new(), ct.clone());
        let ctx = self.pipeline.run(ctx).await.map_err(OrchestratorError::from)?;
        Ok(ctx.results)
    }
}
