//! Registration Validation
//!
//! Pure-Rust input validation for the hospital registration workflow:
//! - Patient and donor form types
//! - Field-level draft collection with submit-time checks
//! - Signature / ID document checks
//!
//! Nothing in this crate performs I/O.

pub mod document;
pub mod form;
pub mod result;

pub use document::{
    validate_document, ImageFormat, ACCEPTED_CONTENT_TYPES, DEFAULT_MAX_DOCUMENT_BYTES,
};
pub use form::{
    parse_age, validate_email, validate_full_name, validate_phone, validate_submission,
    BloodType, ContactInfo, EntityDetails, EntityKind, FormDraft, FormField, Gender, Organ,
    RegistrationForm, Urgency, MAX_AGE, MIN_AGE,
};
pub use result::{ValidationError, ValidationErrorCode, ValidationResult};
