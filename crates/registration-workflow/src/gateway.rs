//! Backend gateway
//!
//! The three backend calls the workflow depends on. The hospital backend is
//! reached over HTTP by [`crate::http::HttpGateway`]; tests substitute
//! scripted implementations.

use async_trait::async_trait;
use registration_validation::{EntityKind, RegistrationForm};
use serde::{Deserialize, Serialize};

use crate::confidence::{BasisPoints, RawConfidence};
use crate::digest::ContentDigest;
use crate::error::GatewayError;
use crate::session::BearerToken;

/// Response to entity creation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "CreatedEntityFields")]
pub struct CreatedEntity {
    pub id: String,
}

/// Id fields the backend may send. Several can appear in one body, so they
/// are read side by side rather than as aliases of one field.
#[derive(Deserialize)]
struct CreatedEntityFields {
    id: Option<String>,
    #[serde(rename = "patientId")]
    patient_id: Option<String>,
    #[serde(rename = "donorId")]
    donor_id: Option<String>,
    #[serde(rename = "_id")]
    record_id: Option<String>,
}

impl TryFrom<CreatedEntityFields> for CreatedEntity {
    type Error = String;

    fn try_from(fields: CreatedEntityFields) -> Result<Self, Self::Error> {
        fields
            .id
            .or(fields.patient_id)
            .or(fields.donor_id)
            .or(fields.record_id)
            .map(|id| CreatedEntity { id })
            .ok_or_else(|| "missing field `id`".to_string())
    }
}

/// Document sent for OCR verification and IPFS storage
#[derive(Clone, Copy, Debug)]
pub struct DocumentUpload<'a> {
    pub entity_id: &'a str,
    pub kind: EntityKind,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Response to a document upload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadReceipt {
    #[serde(alias = "storageAddress", alias = "ipfsHash", alias = "ipfs_hash")]
    pub storage_address: String,
    #[serde(alias = "confidenceScore", alias = "confidence")]
    pub confidence_score: RawConfidence,
    #[serde(alias = "isVerified", alias = "signatureVerified")]
    pub verified: bool,
}

/// Commitment submitted for ledger anchoring
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnchorRequest {
    pub entity_id: String,
    pub kind: EntityKind,
    pub storage_address: String,
    pub digest: ContentDigest,
    pub confidence_bps: BasisPoints,
    pub verified: bool,
}

/// Response to ledger anchoring
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnchorReceipt {
    #[serde(
        alias = "ledgerTxHash",
        alias = "txHash",
        alias = "transactionHash",
        alias = "blockchainHash"
    )]
    pub ledger_tx_hash: String,
}

/// Client side of the hospital backend
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// Persist the entity and return its server-assigned id
    async fn create_entity(
        &self,
        token: &BearerToken,
        form: &RegistrationForm,
    ) -> Result<CreatedEntity, GatewayError>;

    /// Send the document for OCR verification and IPFS storage
    async fn upload_document(
        &self,
        token: &BearerToken,
        upload: DocumentUpload<'_>,
    ) -> Result<UploadReceipt, GatewayError>;

    /// Anchor the document commitment on the ledger
    async fn anchor_to_ledger(
        &self,
        token: &BearerToken,
        request: &AnchorRequest,
    ) -> Result<AnchorReceipt, GatewayError>;
}

#[async_trait]
impl<G: RegistryGateway + ?Sized> RegistryGateway for std::sync::Arc<G> {
    async fn create_entity(
        &self,
        token: &BearerToken,
        form: &RegistrationForm,
    ) -> Result<CreatedEntity, GatewayError> {
        (**self).create_entity(token, form).await
    }

    async fn upload_document(
        &self,
        token: &BearerToken,
        upload: DocumentUpload<'_>,
    ) -> Result<UploadReceipt, GatewayError> {
        (**self).upload_document(token, upload).await
    }

    async fn anchor_to_ledger(
        &self,
        token: &BearerToken,
        request: &AnchorRequest,
    ) -> Result<AnchorReceipt, GatewayError> {
        (**self).anchor_to_ledger(token, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipts_accept_backend_field_names() {
        let created: CreatedEntity = serde_json::from_str(r#"{"_id":"PAT_123"}"#).unwrap();
        assert_eq!(created.id, "PAT_123");

        let receipt: UploadReceipt = serde_json::from_str(
            r#"{"ipfsHash":"QmYwAPJzv5CZsnA","confidenceScore":91,"isVerified":true}"#,
        )
        .unwrap();
        assert_eq!(receipt.storage_address, "QmYwAPJzv5CZsnA");
        assert_eq!(receipt.confidence_score.normalize().value(), 9100);
        assert!(receipt.verified);

        let anchored: AnchorReceipt = serde_json::from_str(r#"{"txHash":"0xabc"}"#).unwrap();
        assert_eq!(anchored.ledger_tx_hash, "0xabc");
    }

    #[test]
    fn test_created_entity_prefers_public_id() {
        let created: CreatedEntity =
            serde_json::from_str(r#"{"_id":"65f0c2","id":"PAT_123"}"#).unwrap();
        assert_eq!(created.id, "PAT_123");

        let created: CreatedEntity =
            serde_json::from_str(r#"{"_id":"65f0c2","donorId":"DON_9"}"#).unwrap();
        assert_eq!(created.id, "DON_9");

        assert!(serde_json::from_str::<CreatedEntity>(r#"{"name":"Jane"}"#).is_err());
        assert_eq!(
            serde_json::to_value(CreatedEntity { id: "PAT_1".to_string() }).unwrap(),
            serde_json::json!({ "id": "PAT_1" })
        );
    }

    #[test]
    fn test_anchor_request_wire_shape() {
        let request = AnchorRequest {
            entity_id: "DON_9".to_string(),
            kind: EntityKind::Donor,
            storage_address: "QmStored".to_string(),
            digest: ContentDigest::of(b"abc"),
            confidence_bps: BasisPoints::new(8700).unwrap(),
            verified: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kind"], "donor");
        assert_eq!(json["confidence_bps"], 8700);
        assert!(json["digest"].as_str().unwrap().starts_with("0xba7816bf"));
    }
}
