//! Registration CLI Tool
//!
//! Register a patient or donor with the hospital backend, verify their
//! signature document and anchor it on the ledger.
//!
//! Usage:
//!   register-entity validate <form.json> <document> [--config <file>]
//!   register-entity digest <document>
//!   register-entity register <form.json> <document> [--config <file>] [--snapshot-out <file>]
//!   register-entity resume <snapshot.json> [--config <file>] [--snapshot-out <file>]
//!
//! The bearer token is read from REGISTRATION_TOKEN.

use clap::{Parser, Subcommand};
use registration_validation::{
    validate_document, validate_submission, EntityKind, FormDraft, FormField, ImageFormat,
    ValidationResult,
};
use registration_workflow::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "register-entity")]
#[command(author = "Mycelix Health")]
#[command(version = "0.1.0")]
#[command(
    about = "Register patients and donors with signature verification and ledger anchoring",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a form and document locally, without contacting the backend
    Validate {
        /// Form as a flat JSON object with a "kind" of patient or donor
        form: PathBuf,

        /// Signature or ID image
        document: PathBuf,

        /// Content type of the document (guessed from the file if omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Client config file (JSON); supplies the document size limit
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the content digest of a document
    Digest {
        document: PathBuf,
    },

    /// Run the full registration workflow
    Register {
        form: PathBuf,

        document: PathBuf,

        /// Client config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        content_type: Option<String>,

        /// Save the workflow state here so a failed run can be resumed
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },

    /// Continue a saved workflow from its current phase
    Resume {
        snapshot: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            form,
            document,
            content_type,
            config,
        } => validate(&form, &document, content_type, config.as_deref()),
        Commands::Digest { document } => {
            let bytes = fs::read(&document)?;
            println!("{}", ContentDigest::of(&bytes));
            Ok(())
        }
        Commands::Register {
            form,
            document,
            config,
            content_type,
            snapshot_out,
        } => {
            let config = ClientConfig::load(config.as_deref())?;
            let max_bytes = config.max_document_bytes;
            let draft = load_draft(&form)?;
            let gateway = HttpGateway::new(config)?;
            let workflow =
                RegistrationWorkflow::new(draft.kind(), gateway, Arc::new(EnvSession::default()))
                    .with_document_limit(max_bytes);

            for field in FormField::ALL {
                if let Some(value) = draft.get(field) {
                    workflow.update_field(field, value)?;
                }
            }

            let (file_name, content_type, bytes) = read_document(&document, content_type)?;
            let preview = workflow.select_document(&file_name, &content_type, bytes)?;
            tracing::info!(
                file = %preview.file_name,
                format = ?preview.format,
                bytes = preview.byte_len,
                "Document selected"
            );

            drive(&workflow, snapshot_out.as_deref()).await
        }
        Commands::Resume {
            snapshot,
            config,
            snapshot_out,
        } => {
            let config = ClientConfig::load(config.as_deref())?;
            let max_bytes = config.max_document_bytes;
            let saved: WorkflowSnapshot = serde_json::from_str(&fs::read_to_string(&snapshot)?)?;
            let gateway = HttpGateway::new(config)?;
            let workflow =
                RegistrationWorkflow::resume(gateway, Arc::new(EnvSession::default()), saved)?
                    .with_document_limit(max_bytes);

            let out = snapshot_out.unwrap_or(snapshot);
            drive(&workflow, Some(&out)).await
        }
    }
}

/// Run the remaining phases, print the progress report and save a snapshot if asked
async fn drive(
    workflow: &RegistrationWorkflow<HttpGateway>,
    snapshot_out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = workflow.run_to_completion().await;

    if let Some(path) = snapshot_out {
        fs::write(path, serde_json::to_string_pretty(&workflow.snapshot())?)?;
        eprintln!("Snapshot written to: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&workflow.progress())?);

    outcome.map(|_| ()).map_err(Into::into)
}

fn validate(
    form: &Path,
    document: &Path,
    content_type: Option<String>,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let max_document_bytes = ClientConfig::load(config)?.max_document_bytes;
    let draft = load_draft(form)?;
    let (file_name, content_type, bytes) = read_document(document, content_type)?;

    let mut errors = match validate_submission(&draft, true) {
        Ok(_) => ValidationResult::new(),
        Err(errors) => errors,
    };
    errors.merge(validate_document(&file_name, &content_type, &bytes, max_document_bytes));

    let report = serde_json::json!({
        "valid": errors.is_valid(),
        "kind": draft.kind(),
        "errors": errors.errors,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    errors.into_result().map_err(Into::into)
}

/// Read a flat JSON form:
/// `{"kind": "donor", "full_name": "...", "age": 45, "organs_pledged": ["kidney"]}`
fn load_draft(path: &Path) -> Result<FormDraft, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let object = value.as_object().ok_or("form must be a JSON object")?;

    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .and_then(EntityKind::parse)
        .ok_or("form needs a \"kind\" of patient or donor")?;

    let mut draft = FormDraft::new(kind);
    for (key, value) in object {
        if key == "kind" {
            continue;
        }
        let field =
            FormField::from_name(key).ok_or_else(|| format!("unknown form field: {}", key))?;
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        };
        draft.set(field, text);
    }
    Ok(draft)
}

fn read_document(
    path: &Path,
    content_type: Option<String>,
) -> Result<(String, String, Vec<u8>), Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or("document path has no file name")?;

    let content_type = match content_type {
        Some(content_type) => content_type,
        None => ImageFormat::from_extension(&file_name)
            .or_else(|| ImageFormat::detect(&bytes))
            .map(|format| format.content_type().to_string())
            .ok_or("cannot determine document content type; pass --content-type")?,
    };
    Ok((file_name, content_type, bytes))
}
