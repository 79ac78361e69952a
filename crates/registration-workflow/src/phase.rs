//! Workflow phases and the network-backed steps between them

use serde::{Deserialize, Serialize};

/// Where a registration currently stands.
///
/// Phases only ever move forward, one step at a time. The only way back to
/// [`WorkflowPhase::CollectingForm`] is a full restart.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPhase {
    CollectingForm,
    EntityCreated,
    DocumentUploaded,
    LedgerAnchored,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 4] = [
        WorkflowPhase::CollectingForm,
        WorkflowPhase::EntityCreated,
        WorkflowPhase::DocumentUploaded,
        WorkflowPhase::LedgerAnchored,
    ];

    /// The step that advances out of this phase, if any
    pub fn next_step(&self) -> Option<PhaseStep> {
        match self {
            WorkflowPhase::CollectingForm => Some(PhaseStep::CreateEntity),
            WorkflowPhase::EntityCreated => Some(PhaseStep::UploadDocument),
            WorkflowPhase::DocumentUploaded => Some(PhaseStep::AnchorToLedger),
            WorkflowPhase::LedgerAnchored => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_step().is_none()
    }

    /// Whether `step` has already been committed in this phase
    pub fn has_completed(&self, step: PhaseStep) -> bool {
        *self >= step.to()
    }

    /// Human-readable status for this phase
    pub fn status(&self) -> &'static str {
        match self {
            WorkflowPhase::CollectingForm => {
                "Fill in the registration form and attach a signature document"
            }
            WorkflowPhase::EntityCreated => "Record created; waiting for signature verification",
            WorkflowPhase::DocumentUploaded => {
                "Signature verified; waiting for blockchain anchoring"
            }
            WorkflowPhase::LedgerAnchored => "Registration complete and anchored on the blockchain",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::CollectingForm => "COLLECTING_FORM",
            WorkflowPhase::EntityCreated => "ENTITY_CREATED",
            WorkflowPhase::DocumentUploaded => "DOCUMENT_UPLOADED",
            WorkflowPhase::LedgerAnchored => "LEDGER_ANCHORED",
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network-backed transition. Each performs exactly one call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStep {
    CreateEntity,
    UploadDocument,
    AnchorToLedger,
}

impl PhaseStep {
    pub const ALL: [PhaseStep; 3] = [
        PhaseStep::CreateEntity,
        PhaseStep::UploadDocument,
        PhaseStep::AnchorToLedger,
    ];

    /// Phase the workflow must be in for this step to run
    pub fn from(&self) -> WorkflowPhase {
        match self {
            PhaseStep::CreateEntity => WorkflowPhase::CollectingForm,
            PhaseStep::UploadDocument => WorkflowPhase::EntityCreated,
            PhaseStep::AnchorToLedger => WorkflowPhase::DocumentUploaded,
        }
    }

    /// Phase reached when this step succeeds
    pub fn to(&self) -> WorkflowPhase {
        match self {
            PhaseStep::CreateEntity => WorkflowPhase::EntityCreated,
            PhaseStep::UploadDocument => WorkflowPhase::DocumentUploaded,
            PhaseStep::AnchorToLedger => WorkflowPhase::LedgerAnchored,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            PhaseStep::CreateEntity => 0,
            PhaseStep::UploadDocument => 1,
            PhaseStep::AnchorToLedger => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStep::CreateEntity => "create_entity",
            PhaseStep::UploadDocument => "upload_document",
            PhaseStep::AnchorToLedger => "anchor_to_ledger",
        }
    }
}

impl std::fmt::Display for PhaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
