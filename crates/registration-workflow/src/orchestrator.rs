//! Registration workflow orchestrator
//!
//! Drives one patient or donor through entity creation, document
//! verification and ledger anchoring. Each step is exactly one gateway call;
//! a failed step leaves every earlier commit in place and can be retried on
//! its own. State lives behind a lock that is never held across an await, so
//! a workflow can be shared between tasks.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use registration_validation::{
    validate_submission, EntityKind, FormDraft, FormField, ValidationErrorCode, ValidationResult,
    DEFAULT_MAX_DOCUMENT_BYTES,
};

use crate::capture::{CaptureError, DocumentCapture, DocumentPreview};
use crate::entity::{RegistrationEntity, VerificationResult};
use crate::error::{ErrorKind, WorkflowError};
use crate::gateway::{AnchorRequest, DocumentUpload, RegistryGateway};
use crate::phase::{PhaseStep, WorkflowPhase};
use crate::progress::{status_line, step_statuses, EventOutcome, ProgressReport, WorkflowEvent};
use crate::session::{BearerToken, Session};
use crate::snapshot::{SnapshotDocument, WorkflowSnapshot, SNAPSHOT_VERSION};

struct WorkflowState {
    phase: WorkflowPhase,
    draft: FormDraft,
    capture: DocumentCapture,
    entity: RegistrationEntity,
    verification: VerificationResult,
    in_flight: Option<PhaseStep>,
    attempts: [u32; 3],
    last_error: Option<WorkflowError>,
    /// Set by an auth failure; only a new session lifts it
    auth_block: Option<WorkflowError>,
    /// Bumped on every `replace_session`
    session_epoch: u64,
    /// Session epoch the in-flight step took its token from
    flight_epoch: u64,
    events: Vec<WorkflowEvent>,
}

impl WorkflowState {
    fn new(kind: EntityKind, max_document_bytes: usize) -> Self {
        Self {
            phase: WorkflowPhase::CollectingForm,
            draft: FormDraft::new(kind),
            capture: DocumentCapture::new(max_document_bytes),
            entity: RegistrationEntity::new(kind),
            verification: VerificationResult::default(),
            in_flight: None,
            attempts: [0; 3],
            last_error: None,
            auth_block: None,
            session_epoch: 0,
            flight_epoch: 0,
            events: Vec::new(),
        }
    }

    fn reject_in_flight(&self) -> Result<(), WorkflowError> {
        match self.in_flight {
            Some(running) => Err(WorkflowError::new(
                self.phase,
                ErrorKind::PhaseInFlight,
                format!("{} is already in progress", running),
            )),
            None => Ok(()),
        }
    }

    /// Whether `step` may start now. Rejections here change no state.
    fn check_ready(&self, step: PhaseStep) -> Result<(), WorkflowError> {
        self.reject_in_flight()?;
        if self.phase != step.from() {
            return Err(WorkflowError::new(
                self.phase,
                ErrorKind::InvalidTransition,
                format!("cannot run {} while {}", step, self.phase),
            ));
        }
        match &self.auth_block {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn entity_id(&self) -> &str {
        self.entity.id.as_deref().unwrap_or("-")
    }

    fn start(&mut self, step: PhaseStep) {
        self.in_flight = Some(step);
        self.flight_epoch = self.session_epoch;
        self.attempts[step.index()] += 1;
        self.events.push(WorkflowEvent::now(step, EventOutcome::Started));
        tracing::info!(
            entity_id = %self.entity_id(),
            phase = %self.phase,
            step = %step,
            attempt = self.attempts[step.index()],
            "Workflow step started"
        );
    }

    fn succeed(&mut self, step: PhaseStep) {
        self.in_flight = None;
        self.phase = step.to();
        self.last_error = None;
        self.events.push(WorkflowEvent::now(step, EventOutcome::Succeeded));
        tracing::info!(
            entity_id = %self.entity_id(),
            phase = %self.phase,
            step = %step,
            "Workflow step succeeded"
        );
    }

    fn fail(&mut self, step: PhaseStep, error: WorkflowError) -> WorkflowError {
        // A token rejected after the session was replaced says nothing about the new one
        let stale_auth = error.kind == ErrorKind::Auth
            && self.in_flight.is_some()
            && self.flight_epoch != self.session_epoch;
        self.in_flight = None;
        self.events.push(WorkflowEvent::now(
            step,
            EventOutcome::Failed {
                kind: error.kind,
                message: error.message.clone(),
            },
        ));
        tracing::warn!(
            entity_id = %self.entity_id(),
            phase = %self.phase,
            step = %step,
            kind = %error.kind,
            error = %error.message,
            "Workflow step failed"
        );
        if stale_auth {
            tracing::info!(step = %step, "Auth failure from a replaced session ignored");
            self.last_error = self.auth_block.clone();
            return error;
        }
        if error.kind == ErrorKind::Auth {
            self.auth_block = Some(error.clone());
        }
        self.last_error = Some(error.clone());
        error
    }

    fn record_validation(&mut self, error: WorkflowError) -> WorkflowError {
        tracing::info!(phase = %self.phase, error = %error.message, "Registration input rejected");
        self.last_error = Some(error.clone());
        error
    }

    /// Drop a validation error once the input changes. A pending auth block shows again.
    fn clear_validation_error(&mut self) {
        if self.last_error.as_ref().map_or(false, |e| e.kind == ErrorKind::Validation) {
            self.last_error = self.auth_block.clone();
        }
    }
}

/// One patient or donor registration
pub struct RegistrationWorkflow<G> {
    gateway: G,
    session: RwLock<Arc<dyn Session>>,
    state: Mutex<WorkflowState>,
}

impl<G: RegistryGateway> RegistrationWorkflow<G> {
    pub fn new(kind: EntityKind, gateway: G, session: Arc<dyn Session>) -> Self {
        Self {
            gateway,
            session: RwLock::new(session),
            state: Mutex::new(WorkflowState::new(kind, DEFAULT_MAX_DOCUMENT_BYTES)),
        }
    }

    /// Change the size limit applied to newly selected documents
    pub fn with_document_limit(mut self, max_bytes: usize) -> Self {
        let state = self.state.get_mut();
        let previous = std::mem::replace(&mut state.capture, DocumentCapture::new(max_bytes));
        state
            .capture
            .restore(previous.asset().cloned(), previous.preview().cloned(), previous.digest());
        self
    }

    /// Rebuild a workflow from a snapshot, continuing from its saved phase
    pub fn resume(
        gateway: G,
        session: Arc<dyn Session>,
        snapshot: WorkflowSnapshot,
    ) -> Result<Self, WorkflowError> {
        snapshot.check()?;

        let mut capture = DocumentCapture::new(DEFAULT_MAX_DOCUMENT_BYTES);
        capture.restore(
            snapshot.document.map(SnapshotDocument::into_asset),
            snapshot.preview,
            snapshot.digest,
        );

        let state = WorkflowState {
            phase: snapshot.phase,
            draft: snapshot.draft,
            capture,
            entity: snapshot.entity,
            verification: snapshot.verification,
            in_flight: None,
            attempts: snapshot.attempts,
            last_error: None,
            auth_block: None,
            session_epoch: 0,
            flight_epoch: 0,
            events: snapshot.events,
        };
        tracing::info!(
            entity_id = %state.entity_id(),
            phase = %state.phase,
            "Workflow resumed from snapshot"
        );

        Ok(Self {
            gateway,
            session: RwLock::new(session),
            state: Mutex::new(state),
        })
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Install a fresh session after re-authentication.
    ///
    /// Lifts a pending auth block so the current step can run again. A step
    /// already in flight keeps the token it started with; if that token is
    /// rejected the failure is reported but does not block the new session.
    pub fn replace_session(&self, session: Arc<dyn Session>) {
        let mut state = self.state.lock();
        *self.session.write() = session;
        state.session_epoch += 1;
        if state.auth_block.take().is_some() {
            if state.last_error.as_ref().map_or(false, |e| e.kind == ErrorKind::Auth) {
                state.last_error = None;
            }
            tracing::info!(
                entity_id = %state.entity_id(),
                phase = %state.phase,
                "Session replaced"
            );
        }
    }

    fn bearer_token(&self) -> Option<BearerToken> {
        self.session.read().bearer_token()
    }

    /// Fetch the token for `step` and mark the step in flight.
    ///
    /// Called with the state lock held, so the token and the session epoch agree.
    fn begin(
        &self,
        state: &mut WorkflowState,
        step: PhaseStep,
    ) -> Result<BearerToken, WorkflowError> {
        match self.bearer_token() {
            Some(token) => {
                state.start(step);
                Ok(token)
            }
            None => {
                let error = WorkflowError::new(
                    state.phase,
                    ErrorKind::Auth,
                    "no active session; sign in to continue",
                );
                Err(state.fail(step, error))
            }
        }
    }

    pub fn update_field(
        &self,
        field: FormField,
        value: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let mut state = self.state.lock();
        Self::check_form_editable(&state)?;
        let kind = state.draft.kind();
        if !field.applies_to(kind) {
            let mut errors = ValidationResult::new();
            errors.add_error(
                field.name(),
                &format!("{} does not apply to {} registrations", field, kind),
                ValidationErrorCode::InvalidFormat,
            );
            return Err(WorkflowError::validation(state.phase, errors));
        }
        state.draft.set(field, value);
        state.clear_validation_error();
        Ok(())
    }

    pub fn clear_field(&self, field: FormField) -> Result<(), WorkflowError> {
        let mut state = self.state.lock();
        Self::check_form_editable(&state)?;
        state.draft.clear(field);
        state.clear_validation_error();
        Ok(())
    }

    fn check_form_editable(state: &WorkflowState) -> Result<(), WorkflowError> {
        state.reject_in_flight()?;
        if state.phase != WorkflowPhase::CollectingForm {
            return Err(WorkflowError::new(
                state.phase,
                ErrorKind::InvalidTransition,
                "the form cannot change once the entity is created; restart to register another",
            ));
        }
        Ok(())
    }

    /// Select the signature / ID document, replacing any earlier selection
    pub fn select_document(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<DocumentPreview, WorkflowError> {
        let mut state = self.state.lock();
        state.reject_in_flight()?;
        if state.capture.is_locked() || state.phase >= WorkflowPhase::DocumentUploaded {
            return Err(WorkflowError::new(
                state.phase,
                ErrorKind::InvalidTransition,
                CaptureError::Locked.to_string(),
            ));
        }

        let phase = state.phase;
        match state.capture.select(file_name, content_type, bytes) {
            Ok(preview) => {
                let preview = preview.clone();
                state.clear_validation_error();
                Ok(preview)
            }
            Err(CaptureError::Invalid(errors)) => {
                Err(state.record_validation(WorkflowError::validation(phase, errors)))
            }
            Err(CaptureError::Locked) => Err(WorkflowError::new(
                phase,
                ErrorKind::InvalidTransition,
                CaptureError::Locked.to_string(),
            )),
        }
    }

    /// Phase 1: validate the form and create the entity.
    ///
    /// Returns the server-assigned entity id.
    pub async fn submit(&self) -> Result<String, WorkflowError> {
        let step = PhaseStep::CreateEntity;
        let (token, form) = {
            let mut state = self.state.lock();
            state.check_ready(step)?;
            let form = match validate_submission(&state.draft, state.capture.is_attached()) {
                Ok(form) => form,
                Err(errors) => {
                    let error = WorkflowError::validation(state.phase, errors);
                    return Err(state.record_validation(error));
                }
            };
            let token = self.begin(&mut state, step)?;
            (token, form)
        };

        let outcome = self.gateway.create_entity(&token, &form).await;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let created = outcome
            .map_err(|e| WorkflowError::from_gateway(state.phase, e))
            .and_then(|created| {
                let id = created.id.trim().to_string();
                if id.is_empty() {
                    Err(WorkflowError::new(
                        state.phase,
                        ErrorKind::Protocol,
                        "backend accepted the entity but returned an empty id",
                    ))
                } else {
                    Ok(id)
                }
            });

        match created {
            Ok(id) => {
                state.entity.record_created(id.clone(), form);
                state.succeed(step);
                Ok(id)
            }
            Err(error) => Err(state.fail(step, error)),
        }
    }

    /// Phase 2: send the selected document for OCR verification and storage.
    ///
    /// On success the document is locked and its digest fixed.
    pub async fn upload_document(&self) -> Result<VerificationResult, WorkflowError> {
        let step = PhaseStep::UploadDocument;
        let (token, asset, entity_id, kind) = {
            let mut state = self.state.lock();
            state.check_ready(step)?;
            let entity_id = match state.entity.id.clone() {
                Some(id) => id,
                None => {
                    return Err(WorkflowError::new(
                        state.phase,
                        ErrorKind::InvalidTransition,
                        "entity has no id; create it first",
                    ))
                }
            };
            let asset = match state.capture.asset().cloned() {
                Some(asset) => asset,
                None => {
                    let mut errors = ValidationResult::new();
                    errors.add_error(
                        "document",
                        "A signature or ID document must be attached",
                        ValidationErrorCode::Required,
                    );
                    let error = WorkflowError::validation(state.phase, errors);
                    return Err(state.record_validation(error));
                }
            };
            let kind = state.entity.kind;
            let token = self.begin(&mut state, step)?;
            (token, asset, entity_id, kind)
        };

        let upload = DocumentUpload {
            entity_id: &entity_id,
            kind,
            file_name: &asset.file_name,
            content_type: &asset.content_type,
            bytes: asset.bytes(),
        };
        let outcome = self.gateway.upload_document(&token, upload).await;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let receipt = match outcome {
            Ok(receipt) if receipt.storage_address.trim().is_empty() => Err(WorkflowError::new(
                state.phase,
                ErrorKind::Ocr,
                "verification returned no storage address",
            )),
            Ok(receipt) => Ok(receipt),
            Err(e) => Err(WorkflowError::from_gateway(state.phase, e)),
        };

        match receipt {
            Ok(receipt) => {
                let confidence = receipt.confidence_score.normalize();
                state.verification.record_upload(
                    receipt.storage_address.trim().to_string(),
                    confidence,
                    receipt.verified,
                );
                let digest = state.capture.lock(&asset);
                state.entity.record_verification(&state.verification);
                tracing::info!(
                    entity_id = %entity_id,
                    confidence = %confidence,
                    verified = receipt.verified,
                    digest = %digest,
                    "Document verified"
                );
                state.succeed(step);
                Ok(state.verification.clone())
            }
            Err(error) => Err(state.fail(step, error)),
        }
    }

    /// Phase 3: anchor the document commitment on the ledger.
    ///
    /// Every attempt submits the digest fixed at upload time.
    pub async fn anchor_to_ledger(&self) -> Result<String, WorkflowError> {
        let step = PhaseStep::AnchorToLedger;
        let (token, request) = {
            let mut state = self.state.lock();
            state.check_ready(step)?;
            let (entity_id, storage_address, digest, confidence_bps) = match (
                state.entity.id.clone(),
                state.verification.storage_address.clone(),
                state.capture.digest(),
                state.verification.confidence_bps,
            ) {
                (Some(id), Some(address), Some(digest), Some(bps)) => (id, address, digest, bps),
                _ => {
                    return Err(WorkflowError::new(
                        state.phase,
                        ErrorKind::InvalidTransition,
                        "document must be uploaded before anchoring",
                    ))
                }
            };
            let request = AnchorRequest {
                entity_id,
                kind: state.entity.kind,
                storage_address,
                digest,
                confidence_bps,
                verified: state.verification.verified,
            };
            let token = self.begin(&mut state, step)?;
            (token, request)
        };

        let outcome = self.gateway.anchor_to_ledger(&token, &request).await;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let anchored = match outcome {
            Ok(receipt) if receipt.ledger_tx_hash.trim().is_empty() => Err(WorkflowError::new(
                state.phase,
                ErrorKind::Ledger,
                "ledger returned an empty transaction hash",
            )),
            Ok(receipt) => {
                let tx_hash = receipt.ledger_tx_hash.trim().to_string();
                state
                    .verification
                    .record_anchor(tx_hash.clone())
                    .map(|()| tx_hash)
                    .map_err(|e| {
                        WorkflowError::new(state.phase, ErrorKind::InvalidTransition, e.to_string())
                    })
            }
            Err(e) => Err(WorkflowError::from_gateway(state.phase, e)),
        };

        match anchored {
            Ok(tx_hash) => {
                state.entity.record_verification(&state.verification);
                state.capture.release();
                tracing::info!(
                    entity_id = %request.entity_id,
                    digest = %request.digest,
                    tx_hash = %tx_hash,
                    "Document anchored"
                );
                state.succeed(step);
                Ok(tx_hash)
            }
            Err(error) => Err(state.fail(step, error)),
        }
    }

    /// Run the remaining steps in order, stopping at the first failure
    pub async fn run_to_completion(&self) -> Result<ProgressReport, WorkflowError> {
        while let Some(step) = self.phase().next_step() {
            match step {
                PhaseStep::CreateEntity => {
                    self.submit().await?;
                }
                PhaseStep::UploadDocument => {
                    self.upload_document().await?;
                }
                PhaseStep::AnchorToLedger => {
                    self.anchor_to_ledger().await?;
                }
            }
        }
        Ok(self.progress())
    }

    /// Start over with an empty form ("register another")
    pub fn restart(&self, kind: EntityKind) -> Result<(), WorkflowError> {
        let mut state = self.state.lock();
        state.reject_in_flight()?;
        let max_bytes = state.capture.max_bytes();
        tracing::info!(
            entity_id = %state.entity_id(),
            phase = %state.phase,
            kind = %kind,
            "Workflow restarted"
        );
        // The session outlives the registration, and so does its auth block
        let auth_block = state.auth_block.take();
        let session_epoch = state.session_epoch;
        *state = WorkflowState::new(kind, max_bytes);
        state.last_error = auth_block.clone();
        state.auth_block = auth_block;
        state.session_epoch = session_epoch;
        Ok(())
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.state.lock().phase
    }

    pub fn kind(&self) -> EntityKind {
        self.state.lock().entity.kind
    }

    pub fn entity_id(&self) -> Option<String> {
        self.state.lock().entity.id.clone()
    }

    pub fn entity(&self) -> RegistrationEntity {
        self.state.lock().entity.clone()
    }

    pub fn verification(&self) -> VerificationResult {
        self.state.lock().verification.clone()
    }

    pub fn draft(&self) -> FormDraft {
        self.state.lock().draft.clone()
    }

    pub fn last_error(&self) -> Option<WorkflowError> {
        self.state.lock().last_error.clone()
    }

    pub fn progress(&self) -> ProgressReport {
        let state = self.state.lock();
        ProgressReport {
            phase: state.phase,
            status: status_line(state.phase, state.in_flight, state.last_error.as_ref()),
            entity_id: state.entity.id.clone(),
            entity: state.entity.clone(),
            verification: state.verification.clone(),
            document: state.capture.preview().cloned(),
            steps: step_statuses(
                state.phase,
                state.in_flight,
                state.last_error.as_ref(),
                &state.attempts,
            ),
            last_error: state.last_error.clone(),
            events: state.events.clone(),
        }
    }

    /// Capture committed state. A step in flight is not part of the snapshot.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.state.lock();
        let document = if state.phase < WorkflowPhase::DocumentUploaded {
            state.capture.asset().map(SnapshotDocument::from_asset)
        } else {
            None
        };
        WorkflowSnapshot {
            version: SNAPSHOT_VERSION,
            phase: state.phase,
            kind: state.entity.kind,
            draft: state.draft.clone(),
            entity: state.entity.clone(),
            verification: state.verification.clone(),
            document,
            preview: state.capture.preview().cloned(),
            digest: state.capture.digest(),
            attempts: state.attempts,
            events: state.events.clone(),
        }
    }
}
