//! Progress reporting and the workflow audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::DocumentPreview;
use crate::entity::{RegistrationEntity, VerificationResult};
use crate::error::{ErrorKind, WorkflowError};
use crate::phase::{PhaseStep, WorkflowPhase};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Started,
    Succeeded,
    Failed { kind: ErrorKind, message: String },
}

/// One entry in the workflow's audit trail
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowEvent {
    pub at: DateTime<Utc>,
    pub step: PhaseStep,
    #[serde(flatten)]
    pub outcome: EventOutcome,
}

impl WorkflowEvent {
    pub fn now(step: PhaseStep, outcome: EventOutcome) -> Self {
        Self {
            at: Utc::now(),
            step,
            outcome,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Not reachable yet
    Pending,
    /// Next step to run
    Ready,
    InFlight,
    Failed,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepStatus {
    pub step: PhaseStep,
    pub state: StepState,
    /// Whether invoking the step again now can make progress
    pub retryable: bool,
    pub attempts: u32,
}

/// Snapshot of a workflow instance for display
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
    pub phase: WorkflowPhase,
    pub status: String,
    /// Known as soon as the entity is created, whatever happens afterwards
    pub entity_id: Option<String>,
    pub entity: RegistrationEntity,
    pub verification: VerificationResult,
    pub document: Option<DocumentPreview>,
    pub steps: Vec<StepStatus>,
    pub last_error: Option<WorkflowError>,
    pub events: Vec<WorkflowEvent>,
}

impl ProgressReport {
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn step(&self, step: PhaseStep) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn is_retryable(&self, step: PhaseStep) -> bool {
        self.step(step).map(|s| s.retryable).unwrap_or(false)
    }
}

/// Status line combining the phase with the latest failure, if any
pub fn status_line(
    phase: WorkflowPhase,
    in_flight: Option<PhaseStep>,
    last_error: Option<&WorkflowError>,
) -> String {
    if let Some(step) = in_flight {
        return format!("{} in progress", step_label(step));
    }
    match last_error {
        Some(error) if error.kind == ErrorKind::Auth => {
            format!("{}. Sign in again to continue from this step.", error.message)
        }
        Some(error) if error.is_retryable() => {
            format!("{}. You can retry this step.", error.message)
        }
        Some(error) => error.message.clone(),
        None => phase.status().to_string(),
    }
}

fn step_label(step: PhaseStep) -> &'static str {
    match step {
        PhaseStep::CreateEntity => "Creating record",
        PhaseStep::UploadDocument => "Verifying signature",
        PhaseStep::AnchorToLedger => "Anchoring on the blockchain",
    }
}

pub(crate) fn step_statuses(
    phase: WorkflowPhase,
    in_flight: Option<PhaseStep>,
    last_error: Option<&WorkflowError>,
    attempts: &[u32; 3],
) -> Vec<StepStatus> {
    PhaseStep::ALL
        .iter()
        .map(|&step| {
            let is_current = phase.next_step() == Some(step);
            let failed_here = is_current && last_error.map_or(false, |e| e.phase == step.from());
            let state = if phase.has_completed(step) {
                StepState::Completed
            } else if in_flight == Some(step) {
                StepState::InFlight
            } else if failed_here {
                StepState::Failed
            } else if is_current {
                StepState::Ready
            } else {
                StepState::Pending
            };
            let retryable = state == StepState::Failed
                && last_error.map_or(false, |e| e.is_retryable());
            StepStatus {
                step,
                state,
                retryable,
                attempts: attempts[step.index()],
            }
        })
        .collect()
}
