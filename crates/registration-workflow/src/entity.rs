//! Client-side view of the entity being registered

use registration_validation::{EntityKind, RegistrationForm};
use serde::{Deserialize, Serialize};

use crate::confidence::BasisPoints;

/// Outcome of document verification, filled in phase by phase
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationResult {
    /// IPFS address of the stored document
    pub storage_address: Option<String>,
    pub confidence_bps: Option<BasisPoints>,
    pub verified: bool,
    pub ledger_tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot record a ledger anchor before the document has a storage address")]
pub struct AnchorBeforeUpload;

impl VerificationResult {
    pub fn record_upload(
        &mut self,
        storage_address: String,
        confidence: BasisPoints,
        verified: bool,
    ) {
        self.storage_address = Some(storage_address);
        self.confidence_bps = Some(confidence);
        self.verified = verified;
    }

    /// Record the ledger transaction. Refused while no storage address is known.
    pub fn record_anchor(&mut self, ledger_tx_hash: String) -> Result<(), AnchorBeforeUpload> {
        if self.storage_address.is_none() {
            return Err(AnchorBeforeUpload);
        }
        self.ledger_tx_hash = Some(ledger_tx_hash);
        Ok(())
    }

    pub fn is_anchored(&self) -> bool {
        self.ledger_tx_hash.is_some()
    }
}

/// Patient or donor record as the backend now holds it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationEntity {
    /// Server-assigned id, known once the entity is created
    pub id: Option<String>,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<RegistrationForm>,
    pub signature_ipfs_hash: Option<String>,
    pub signature_verified: bool,
    pub blockchain_hash: Option<String>,
}

impl RegistrationEntity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            id: None,
            kind,
            form: None,
            signature_ipfs_hash: None,
            signature_verified: false,
            blockchain_hash: None,
        }
    }

    pub(crate) fn record_created(&mut self, id: String, form: RegistrationForm) {
        self.id = Some(id);
        self.form = Some(form);
    }

    pub(crate) fn record_verification(&mut self, verification: &VerificationResult) {
        self.signature_ipfs_hash = verification.storage_address.clone();
        self.signature_verified = verification.verified;
        self.blockchain_hash = verification.ledger_tx_hash.clone();
    }
}
