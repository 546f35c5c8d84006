//! Per-turn execution trace.
//!
//! Purely observational: the pipeline writes steps, nothing reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentTraceStep {
    pub agent: String,
    pub action: String,
    pub status: TraceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered trace steps for one turn.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    steps: Vec<AgentTraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending step and return its handle.
    pub fn start(&mut self, agent: &str, action: &str) -> usize {
        self.steps.push(AgentTraceStep {
            agent: agent.to_string(),
            action: action.to_string(),
            status: TraceStatus::Pending,
            reasoning: None,
            timestamp: Utc::now(),
        });
        self.steps.len() - 1
    }

    pub fn succeed(&mut self, step: usize, reasoning: impl Into<String>) {
        self.finish(step, TraceStatus::Success, reasoning.into());
    }

    pub fn fail(&mut self, step: usize, reasoning: impl Into<String>) {
        self.finish(step, TraceStatus::Failed, reasoning.into());
    }

    /// Append an already-finished step.
    pub fn record(
        &mut self,
        agent: &str,
        action: &str,
        status: TraceStatus,
        reasoning: impl Into<String>,
    ) {
        let step = self.start(agent, action);
        self.finish(step, status, reasoning.into());
    }

    fn finish(&mut self, step: usize, status: TraceStatus, reasoning: String) {
        if let Some(s) = self.steps.get_mut(step) {
            s.status = status;
            if !reasoning.is_empty() {
                s.reasoning = Some(reasoning);
            }
        }
    }

    pub fn steps(&self) -> &[AgentTraceStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<AgentTraceStep> {
        self.steps
    }
}
