//! Saved workflow state
//!
//! A snapshot captures everything already committed so a registration can
//! continue from its current phase after re-authentication or a restart of
//! the client. Document bytes are only kept while an upload is still
//! outstanding; afterwards the digest alone is enough.

use registration_validation::{EntityKind, FormDraft};
use serde::{Deserialize, Serialize};

use crate::capture::{DocumentAsset, DocumentPreview};
use crate::digest::ContentDigest;
use crate::entity::{RegistrationEntity, VerificationResult};
use crate::error::{ErrorKind, WorkflowError};
use crate::phase::WorkflowPhase;
use crate::progress::WorkflowEvent;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotDocument {
    pub file_name: String,
    pub content_type: String,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl SnapshotDocument {
    pub(crate) fn from_asset(asset: &DocumentAsset) -> Self {
        Self {
            file_name: asset.file_name.clone(),
            content_type: asset.content_type.clone(),
            bytes: asset.bytes().to_vec(),
        }
    }

    pub(crate) fn into_asset(self) -> DocumentAsset {
        DocumentAsset::new(self.file_name, self.content_type, self.bytes)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSnapshot {
    pub version: u32,
    pub phase: WorkflowPhase,
    pub kind: EntityKind,
    pub draft: FormDraft,
    pub entity: RegistrationEntity,
    pub verification: VerificationResult,
    pub document: Option<SnapshotDocument>,
    pub preview: Option<DocumentPreview>,
    pub digest: Option<ContentDigest>,
    pub attempts: [u32; 3],
    #[serde(default)]
    pub events: Vec<WorkflowEvent>,
}

impl WorkflowSnapshot {
    /// Check that the saved state is one the workflow could have produced
    pub fn check(&self) -> Result<(), WorkflowError> {
        let invalid = |message: &str| {
            Err(WorkflowError::new(self.phase, ErrorKind::InvalidSnapshot, message))
        };

        if self.version != SNAPSHOT_VERSION {
            return invalid(&format!("unsupported snapshot version {}", self.version));
        }
        if self.draft.kind() != self.kind || self.entity.kind != self.kind {
            return invalid("entity kind does not match the saved form");
        }

        let phase = self.phase;
        if phase >= WorkflowPhase::EntityCreated
            && (self.entity.id.is_none() || self.entity.form.is_none())
        {
            return invalid("entity id and form are required once the entity is created");
        }
        if phase == WorkflowPhase::EntityCreated && self.document.is_none() {
            return invalid("document bytes are required until the upload succeeds");
        }
        if phase >= WorkflowPhase::DocumentUploaded
            && (self.verification.storage_address.is_none() || self.digest.is_none())
        {
            return invalid("storage address and digest are required once the document is uploaded");
        }
        // Anchoring submits the confidence recorded at upload
        if phase >= WorkflowPhase::DocumentUploaded && self.verification.confidence_bps.is_none() {
            return invalid("confidence score is required once the document is uploaded");
        }
        if phase < WorkflowPhase::DocumentUploaded && self.digest.is_some() {
            return invalid("digest present before the document was uploaded");
        }
        if self.verification.ledger_tx_hash.is_some()
            && self.verification.storage_address.is_none()
        {
            return invalid("ledger hash present without a storage address");
        }
        if (phase == WorkflowPhase::LedgerAnchored) != self.verification.ledger_tx_hash.is_some() {
            return invalid("ledger hash must be present exactly when the workflow is anchored");
        }
        Ok(())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::BasisPoints;
    use registration_validation::{validate_submission, FormField};

    fn anchored_snapshot() -> WorkflowSnapshot {
        let mut verification = VerificationResult::default();
        verification.record_upload("QmStored".to_string(), BasisPoints::new(9100).unwrap(), true);
        verification.record_anchor("0xabc".to_string()).unwrap();

        let mut entity = RegistrationEntity::new(EntityKind::Patient);
        entity.id = Some("PAT_123".to_string());
        entity.record_verification(&verification);

        WorkflowSnapshot {
            version: SNAPSHOT_VERSION,
            phase: WorkflowPhase::LedgerAnchored,
            kind: EntityKind::Patient,
            draft: FormDraft::new(EntityKind::Patient),
            entity,
            verification,
            document: None,
            preview: None,
            digest: Some(ContentDigest::of(b"bytes")),
            attempts: [1, 1, 1],
            events: Vec::new(),
        }
    }

    fn uploaded_snapshot() -> WorkflowSnapshot {
        let mut draft = FormDraft::new(EntityKind::Patient);
        for (field, value) in [
            (FormField::FullName, "Jane Doe"),
            (FormField::Age, "34"),
            (FormField::Gender, "female"),
            (FormField::BloodType, "A+"),
            (FormField::Phone, "+1 (555) 010-0100"),
            (FormField::Email, "jane.doe@example.org"),
            (FormField::Address, "12 Elm Street"),
            (FormField::OrganNeeded, "kidney"),
            (FormField::Urgency, "high"),
        ] {
            draft.set(field, value);
        }
        let form = validate_submission(&draft, true).unwrap();

        let mut verification = VerificationResult::default();
        verification.record_upload("QmStored".to_string(), BasisPoints::new(9100).unwrap(), true);

        let mut entity = RegistrationEntity::new(EntityKind::Patient);
        entity.record_created("PAT_123".to_string(), form);
        entity.record_verification(&verification);

        WorkflowSnapshot {
            version: SNAPSHOT_VERSION,
            phase: WorkflowPhase::DocumentUploaded,
            kind: EntityKind::Patient,
            draft,
            entity,
            verification,
            document: None,
            preview: None,
            digest: Some(ContentDigest::of(b"bytes")),
            attempts: [1, 1, 0],
            events: Vec::new(),
        }
    }

    #[test]
    fn test_uploaded_snapshot_is_accepted() {
        uploaded_snapshot().check().unwrap();
    }

    #[test]
    fn test_uploaded_snapshot_needs_confidence() {
        let mut snapshot = uploaded_snapshot();
        snapshot.verification.confidence_bps = None;
        let err = snapshot.check().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSnapshot);
        assert!(err.message.contains("confidence"));
    }

    #[test]
    fn test_missing_form_is_rejected() {
        let snapshot = anchored_snapshot();
        let err = snapshot.check().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSnapshot);
    }

    #[test]
    fn test_version_mismatch() {
        let mut snapshot = anchored_snapshot();
        snapshot.version = 99;
        let err = snapshot.check().unwrap_err();
        assert!(err.message.contains("version 99"));
    }

    #[test]
    fn test_document_bytes_serialize_as_hex() {
        let doc = SnapshotDocument {
            file_name: "sig.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["bytes"], "89504e47");
        let back: SnapshotDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
