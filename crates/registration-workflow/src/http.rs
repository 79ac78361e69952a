//! HTTP gateway to the hospital backend
//!
//! JSON over HTTP with bearer authentication. Each call maps its failure
//! statuses onto the workflow's error taxonomy; see [`classify_failure`].

use async_trait::async_trait;
use registration_validation::RegistrationForm;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{ClientConfig, ConfigError};
use crate::error::GatewayError;
use crate::gateway::{
    AnchorReceipt, AnchorRequest, CreatedEntity, DocumentUpload, RegistryGateway, UploadReceipt,
};
use crate::session::BearerToken;

/// Longest backend message carried into an error
const MAX_MESSAGE_LEN: usize = 300;

/// Which backend call a response belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    CreateEntity,
    UploadDocument,
    AnchorToLedger,
}

/// Map a non-success status to the error kind for that call
pub fn classify_failure(call: GatewayCall, status: u16, message: String) -> GatewayError {
    if status == 401 || status == 403 {
        return GatewayError::Auth(message);
    }

    let server_side = status >= 500;
    match call {
        GatewayCall::CreateEntity if server_side => GatewayError::Server(message),
        GatewayCall::CreateEntity => GatewayError::Validation(message),
        GatewayCall::UploadDocument if server_side => GatewayError::Ocr(message),
        GatewayCall::UploadDocument => GatewayError::Upload(message),
        GatewayCall::AnchorToLedger => GatewayError::Ledger(message),
    }
}

/// Pull a readable message out of an error body
pub fn extract_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    let from_json = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty());

    let message = match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => body.trim().to_string(),
    };

    if message.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{}…", truncated)
    } else {
        message
    }
}

/// Success bodies may wrap the payload in `data`
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|e| GatewayError::Network(format!("unreadable response body: {}", e)))
}

/// A success status whose body cannot be used. The entity may already
/// exist after a create, so that call is not reported as retryable.
fn unusable_response(call: GatewayCall, error: GatewayError) -> GatewayError {
    match (call, error) {
        (GatewayCall::CreateEntity, GatewayError::Network(message)) => {
            GatewayError::Protocol(format!("entity may have been created: {}", message))
        }
        (_, error) => error,
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Network(format!("request timed out: {}", error))
    } else {
        GatewayError::Network(error.to_string())
    }
}

pub struct HttpGateway {
    client: Client,
    config: ClientConfig,
}

impl HttpGateway {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Use a preconfigured client, e.g. with custom TLS roots or proxy rules
    pub fn with_client(config: ClientConfig, client: Client) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        call: GatewayCall,
        request: RequestBuilder,
        token: &BearerToken,
    ) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = extract_message(status.as_u16(), &body);
            tracing::debug!(?call, status = status.as_u16(), %message, "Backend call failed");
            return Err(classify_failure(call, status.as_u16(), message));
        }

        let decoded = if status == StatusCode::NO_CONTENT {
            Err(GatewayError::Network("backend returned an empty response".to_string()))
        } else {
            decode_body(&body)
        };
        decoded.map_err(|error| unusable_response(call, error))
    }
}

#[async_trait]
impl RegistryGateway for HttpGateway {
    async fn create_entity(
        &self,
        token: &BearerToken,
        form: &RegistrationForm,
    ) -> Result<CreatedEntity, GatewayError> {
        let url = self.config.url(self.config.endpoints.create_path(form.kind()));
        let request = self.client.post(url).json(form);
        self.execute(GatewayCall::CreateEntity, request, token).await
    }

    async fn upload_document(
        &self,
        token: &BearerToken,
        upload: DocumentUpload<'_>,
    ) -> Result<UploadReceipt, GatewayError> {
        let url = self
            .config
            .url(&self.config.endpoints.upload_path(upload.kind, upload.entity_id));

        let part = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.to_string())
            .mime_str(upload.content_type)
            .map_err(|e| GatewayError::Upload(format!("invalid content type: {}", e)))?;
        let form = Form::new()
            .text("entity_id", upload.entity_id.to_string())
            .part(self.config.endpoints.upload_field.clone(), part);

        let request = self.client.post(url).multipart(form);
        self.execute(GatewayCall::UploadDocument, request, token).await
    }

    async fn anchor_to_ledger(
        &self,
        token: &BearerToken,
        request: &AnchorRequest,
    ) -> Result<AnchorReceipt, GatewayError> {
        let url = self
            .config
            .url(&self.config.endpoints.anchor_path(request.kind, &request.entity_id));
        let builder = self.client.post(url).json(request);
        self.execute(GatewayCall::AnchorToLedger, builder, token).await
    }
}
