//! Registration Workflow
//!
//! Client-side workflow for registering patients and organ donors with the
//! hospital backend:
//! - Phase 1: validate the form and create the entity
//! - Phase 2: upload the signature / ID document for OCR verification and IPFS storage
//! - Phase 3: anchor the document's SHA-256 digest on the ledger
//!
//! Each phase is one backend call, committed independently. A failure keeps
//! everything committed so far and only the failed phase is retried.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use registration_workflow::{ClientConfig, EnvSession, HttpGateway, RegistrationWorkflow};
//! use registration_validation::{EntityKind, FormField};
//!
//! let gateway = HttpGateway::new(ClientConfig::load(None)?)?;
//! let session = Arc::new(EnvSession::default());
//! let workflow = RegistrationWorkflow::new(EntityKind::Patient, gateway, session);
//! workflow.update_field(FormField::FullName, "Jane Doe")?;
//! // ... remaining fields
//! workflow.select_document("signature.png", "image/png", bytes)?;
//! let report = workflow.run_to_completion().await?;
//! ```

pub mod capture;
pub mod confidence;
pub mod config;
pub mod digest;
pub mod entity;
pub mod error;
pub mod gateway;
#[cfg(feature = "http")]
pub mod http;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod session;
pub mod snapshot;

pub use capture::{CaptureError, DocumentAsset, DocumentCapture, DocumentPreview};
pub use confidence::{normalize_confidence, BasisPoints, ConfidenceUnit, RawConfidence, MAX_BPS};
pub use config::{ClientConfig, ConfigError, EndpointConfig};
pub use digest::{ContentDigest, DigestParseError};
pub use entity::{RegistrationEntity, VerificationResult};
pub use error::{ErrorKind, GatewayError, WorkflowError};
pub use gateway::{
    AnchorReceipt, AnchorRequest, CreatedEntity, DocumentUpload, RegistryGateway, UploadReceipt,
};
#[cfg(feature = "http")]
pub use http::HttpGateway;
pub use orchestrator::RegistrationWorkflow;
pub use phase::{PhaseStep, WorkflowPhase};
pub use progress::{EventOutcome, ProgressReport, StepState, StepStatus, WorkflowEvent};
pub use session::{BearerToken, EnvSession, Session, StaticSession};
pub use snapshot::{SnapshotDocument, WorkflowSnapshot};
