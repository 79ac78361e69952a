//! Patient and donor registration forms
//!
//! Field values are collected as raw text through [`FormDraft::set`] and only
//! parsed and checked when the form is submitted. A successful
//! [`FormDraft::validate`] yields a typed [`RegistrationForm`], which is what
//! gets sent to the backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::result::{ValidationErrorCode, ValidationResult};

pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;
pub const MAX_NAME_LEN: usize = 120;
pub const MAX_ADDRESS_LEN: usize = 300;
pub const MAX_MEDICAL_HISTORY_LEN: usize = 2000;

/// Which kind of record the hospital is registering
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Patient,
    Donor,
}

impl EntityKind {
    /// Collection segment used in backend paths
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Donor => "donors",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" | "patients" | "recipient" => Some(EntityKind::Patient),
            "donor" | "donors" => Some(EntityKind::Donor),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Patient => write!(f, "patient"),
            EntityKind::Donor => write!(f, "donor"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    ABPositive,
    #[serde(rename = "AB-")]
    ABNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "A+" => Some(BloodType::APositive),
            "A-" => Some(BloodType::ANegative),
            "B+" => Some(BloodType::BPositive),
            "B-" => Some(BloodType::BNegative),
            "AB+" => Some(BloodType::ABPositive),
            "AB-" => Some(BloodType::ABNegative),
            "O+" => Some(BloodType::OPositive),
            "O-" => Some(BloodType::ONegative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::ABPositive => "AB+",
            BloodType::ABNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "other" | "intersex" | "non-binary" | "nonbinary" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Organ {
    Kidney,
    Liver,
    Heart,
    Lung,
    Pancreas,
    Intestine,
    Cornea,
    BoneMarrow,
}

impl Organ {
    /// Parse an organ name, tolerating case, spaces/hyphens and plurals
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(|c: char| c == ' ' || c == '-', "_");
        Self::from_normalized(&normalized).or_else(|| {
            normalized
                .strip_suffix('s')
                .and_then(Self::from_normalized)
        })
    }

    fn from_normalized(s: &str) -> Option<Self> {
        match s {
            "kidney" => Some(Organ::Kidney),
            "liver" => Some(Organ::Liver),
            "heart" => Some(Organ::Heart),
            "lung" => Some(Organ::Lung),
            "pancreas" => Some(Organ::Pancreas),
            "intestine" => Some(Organ::Intestine),
            "cornea" => Some(Organ::Cornea),
            "bone_marrow" => Some(Organ::BoneMarrow),
            _ => None,
        }
    }
}

/// Clinical urgency of a waiting patient
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Urgency::Low),
            "medium" | "moderate" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            "critical" | "urgent" => Some(Urgency::Critical),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Kind-specific part of a registration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityDetails {
    Patient { organ_needed: Organ, urgency: Urgency },
    Donor { organs_pledged: Vec<Organ> },
}

/// A fully validated registration, ready for submission
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationForm {
    pub full_name: String,
    pub age: u8,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub contact: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(flatten)]
    pub details: EntityDetails,
}

impl RegistrationForm {
    pub fn kind(&self) -> EntityKind {
        match self.details {
            EntityDetails::Patient { .. } => EntityKind::Patient,
            EntityDetails::Donor { .. } => EntityKind::Donor,
        }
    }
}

/// Individually updatable form fields
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    FullName,
    Age,
    Gender,
    BloodType,
    Phone,
    Email,
    Address,
    MedicalHistory,
    OrganNeeded,
    Urgency,
    OrgansPledged,
}

impl FormField {
    pub const ALL: [FormField; 11] = [
        FormField::FullName,
        FormField::Age,
        FormField::Gender,
        FormField::BloodType,
        FormField::Phone,
        FormField::Email,
        FormField::Address,
        FormField::MedicalHistory,
        FormField::OrganNeeded,
        FormField::Urgency,
        FormField::OrgansPledged,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FormField::FullName => "full_name",
            FormField::Age => "age",
            FormField::Gender => "gender",
            FormField::BloodType => "blood_type",
            FormField::Phone => "phone",
            FormField::Email => "email",
            FormField::Address => "address",
            FormField::MedicalHistory => "medical_history",
            FormField::OrganNeeded => "organ_needed",
            FormField::Urgency => "urgency",
            FormField::OrgansPledged => "organs_pledged",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Whether the field belongs on a form of the given kind
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        match self {
            FormField::OrganNeeded | FormField::Urgency => kind == EntityKind::Patient,
            FormField::OrgansPledged => kind == EntityKind::Donor,
            _ => true,
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw, unvalidated field values as typed by hospital staff
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormDraft {
    kind: EntityKind,
    values: BTreeMap<FormField, String>,
}

impl FormDraft {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Record a field update. No checks happen here.
    pub fn set(&mut self, field: FormField, value: impl Into<String>) -> &mut Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn clear(&mut self, field: FormField) {
        self.values.remove(&field);
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Trimmed value, or a `Required` error when missing or blank
    fn required(
        &self,
        field: FormField,
        label: &str,
        result: &mut ValidationResult,
    ) -> Option<&str> {
        match self.get(field).map(str::trim) {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                result.add_error(
                    field.name(),
                    &format!("{} is required", label),
                    ValidationErrorCode::Required,
                );
                None
            }
        }
    }

    /// Parse and check every field, accumulating all errors
    pub fn validate(&self) -> Result<RegistrationForm, ValidationResult> {
        let mut result = ValidationResult::new();

        let full_name = self.required(FormField::FullName, "Full name", &mut result);
        if let Some(name) = full_name {
            result.merge(validate_full_name(name));
        }

        let age = self
            .required(FormField::Age, "Age", &mut result)
            .and_then(|raw| match parse_age(raw) {
                Ok(age) => Some(age),
                Err(errors) => {
                    result.merge(errors);
                    None
                }
            });

        let gender = self
            .required(FormField::Gender, "Gender", &mut result)
            .and_then(|raw| {
                let parsed = Gender::parse(raw);
                if parsed.is_none() {
                    result.add_error(
                        FormField::Gender.name(),
                        &format!("Unknown gender '{}'", raw),
                        ValidationErrorCode::InvalidFormat,
                    );
                }
                parsed
            });

        let blood_type = self
            .required(FormField::BloodType, "Blood type", &mut result)
            .and_then(|raw| {
                let parsed = BloodType::parse(raw);
                if parsed.is_none() {
                    result.add_error(
                        FormField::BloodType.name(),
                        &format!("Unknown blood type '{}'", raw),
                        ValidationErrorCode::InvalidFormat,
                    );
                }
                parsed
            });

        let phone = self.required(FormField::Phone, "Phone", &mut result);
        if let Some(phone) = phone {
            result.merge(validate_phone(phone));
        }

        let email = self.required(FormField::Email, "Email", &mut result);
        if let Some(email) = email {
            result.merge(validate_email(email));
        }

        let address = self.required(FormField::Address, "Address", &mut result);
        if let Some(address) = address {
            if address.chars().count() > MAX_ADDRESS_LEN {
                result.add_error(
                    FormField::Address.name(),
                    &format!("Address cannot exceed {} characters", MAX_ADDRESS_LEN),
                    ValidationErrorCode::TooLong,
                );
            }
        }

        let medical_history = self
            .get(FormField::MedicalHistory)
            .map(str::trim)
            .filter(|h| !h.is_empty());
        if let Some(history) = medical_history {
            if history.chars().count() > MAX_MEDICAL_HISTORY_LEN {
                result.add_error(
                    FormField::MedicalHistory.name(),
                    &format!(
                        "Medical history cannot exceed {} characters",
                        MAX_MEDICAL_HISTORY_LEN
                    ),
                    ValidationErrorCode::TooLong,
                );
            }
        }

        let details = match self.kind {
            EntityKind::Patient => self.validate_patient_details(&mut result),
            EntityKind::Donor => self.validate_donor_details(&mut result),
        };

        if !result.is_valid() {
            return Err(result);
        }

        match (full_name, age, gender, blood_type, phone, email, address, details) {
            (
                Some(full_name),
                Some(age),
                Some(gender),
                Some(blood_type),
                Some(phone),
                Some(email),
                Some(address),
                Some(details),
            ) => Ok(RegistrationForm {
                full_name: full_name.to_string(),
                age,
                gender,
                blood_type,
                contact: ContactInfo {
                    phone: phone.to_string(),
                    email: email.to_string(),
                    address: address.to_string(),
                },
                medical_history: medical_history.map(str::to_string),
                details,
            }),
            // Every missing value above has already recorded an error
            _ => Err(result),
        }
    }

    fn validate_patient_details(&self, result: &mut ValidationResult) -> Option<EntityDetails> {
        let organ_needed = self
            .required(FormField::OrganNeeded, "Organ needed", result)
            .and_then(|raw| {
                let parsed = Organ::parse(raw);
                if parsed.is_none() {
                    result.add_error(
                        FormField::OrganNeeded.name(),
                        &format!("Unknown organ '{}'", raw),
                        ValidationErrorCode::InvalidFormat,
                    );
                }
                parsed
            });

        let urgency = self
            .required(FormField::Urgency, "Urgency", result)
            .and_then(|raw| {
                let parsed = Urgency::parse(raw);
                if parsed.is_none() {
                    result.add_error(
                        FormField::Urgency.name(),
                        &format!("Unknown urgency level '{}'", raw),
                        ValidationErrorCode::InvalidFormat,
                    );
                }
                parsed
            });

        Some(EntityDetails::Patient {
            organ_needed: organ_needed?,
            urgency: urgency?,
        })
    }

    fn validate_donor_details(&self, result: &mut ValidationResult) -> Option<EntityDetails> {
        let raw = self.required(FormField::OrgansPledged, "Organs pledged", result)?;

        let mut organs = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match Organ::parse(part) {
                Some(organ) if !organs.contains(&organ) => organs.push(organ),
                Some(_) => {}
                None => result.add_error(
                    FormField::OrgansPledged.name(),
                    &format!("Unknown organ '{}'", part),
                    ValidationErrorCode::InvalidFormat,
                ),
            }
        }

        if organs.is_empty() {
            if !result.has_error_for(FormField::OrgansPledged.name()) {
                result.add_error(
                    FormField::OrgansPledged.name(),
                    "At least one organ must be pledged",
                    ValidationErrorCode::Required,
                );
            }
            return None;
        }

        organs.sort();
        Some(EntityDetails::Donor { organs_pledged: organs })
    }
}

/// Validate the draft together with the attached document.
///
/// Submission is rejected without any network call when fields are missing,
/// out of range, or no document has been selected.
pub fn validate_submission(
    draft: &FormDraft,
    document_attached: bool,
) -> Result<RegistrationForm, ValidationResult> {
    let form = draft.validate();

    if document_attached {
        return form;
    }

    let mut result = match form {
        Ok(_) => ValidationResult::new(),
        Err(errors) => errors,
    };
    result.add_error(
        "document",
        "A signature or ID document must be attached",
        ValidationErrorCode::Required,
    );
    Err(result)
}

/// Parse an age in whole years, within [MIN_AGE, MAX_AGE]
pub fn parse_age(raw: &str) -> Result<u8, ValidationResult> {
    let mut result = ValidationResult::new();

    let age: i64 = match raw.trim().parse() {
        Ok(age) => age,
        Err(_) => {
            result.add_error(
                "age",
                "Age must be a whole number",
                ValidationErrorCode::InvalidFormat,
            );
            return Err(result);
        }
    };

    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        result.add_error(
            "age",
            &format!("Age must be between {} and {}, got {}", MIN_AGE, MAX_AGE, age),
            ValidationErrorCode::OutOfRange,
        );
        return Err(result);
    }

    // Range check above guarantees the value fits
    Ok(age as u8)
}

pub fn validate_full_name(name: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    let len = name.chars().count();

    if len < 2 {
        result.add_error(
            "full_name",
            "Full name must be at least 2 characters",
            ValidationErrorCode::TooShort,
        );
    }

    if len > MAX_NAME_LEN {
        result.add_error(
            "full_name",
            &format!("Full name cannot exceed {} characters", MAX_NAME_LEN),
            ValidationErrorCode::TooLong,
        );
    }

    result
}

/// Validate an email address
///
/// Must have exactly one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if email.is_empty() {
        result.add_error("email", "Email is required", ValidationErrorCode::Required);
        return result;
    }

    if email.len() > 254 {
        result.add_error(
            "email",
            "Email cannot exceed 254 characters",
            ValidationErrorCode::TooLong,
        );
    }

    if email.chars().any(char::is_whitespace) {
        result.add_error(
            "email",
            "Email cannot contain whitespace",
            ValidationErrorCode::InvalidFormat,
        );
        return result;
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        result.add_error(
            "email",
            "Email must contain exactly one '@'",
            ValidationErrorCode::InvalidFormat,
        );
        return result;
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() {
        result.add_error(
            "email",
            "Email is missing the part before '@'",
            ValidationErrorCode::InvalidFormat,
        );
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        result.add_error(
            "email",
            "Email domain must look like 'example.org'",
            ValidationErrorCode::InvalidFormat,
        );
    }

    result
}

/// Validate a phone number: 7-15 digits, common separators allowed
pub fn validate_phone(phone: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if phone.is_empty() {
        result.add_error("phone", "Phone is required", ValidationErrorCode::Required);
        return result;
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'))
    {
        result.add_error(
            "phone",
            "Phone can only contain digits, spaces and + - ( ) .",
            ValidationErrorCode::InvalidFormat,
        );
        return result;
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 7 {
        result.add_error(
            "phone",
            "Phone must contain at least 7 digits",
            ValidationErrorCode::TooShort,
        );
    } else if digits > 15 {
        result.add_error(
            "phone",
            "Phone cannot contain more than 15 digits",
            ValidationErrorCode::TooLong,
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_draft() -> FormDraft {
        let mut draft = FormDraft::new(EntityKind::Patient);
        draft
            .set(FormField::FullName, "Jane Doe")
            .set(FormField::Age, "34")
            .set(FormField::Gender, "female")
            .set(FormField::BloodType, "O+")
            .set(FormField::Phone, "+1 (555) 010-2030")
            .set(FormField::Email, "jane.doe@example.org")
            .set(FormField::Address, "12 Harbor Road, Springfield")
            .set(FormField::OrganNeeded, "kidney")
            .set(FormField::Urgency, "high");
        draft
    }

    fn donor_draft() -> FormDraft {
        let mut draft = FormDraft::new(EntityKind::Donor);
        draft
            .set(FormField::FullName, "Sam Rivera")
            .set(FormField::Age, "41")
            .set(FormField::Gender, "male")
            .set(FormField::BloodType, "ab-")
            .set(FormField::Phone, "555-0100-22")
            .set(FormField::Email, "sam@rivera.net")
            .set(FormField::Address, "7 Elm Street")
            .set(FormField::OrgansPledged, "Liver, kidneys, bone marrow, kidney");
        draft
    }

    #[test]
    fn test_valid_patient_form() {
        let form = patient_draft().validate().unwrap();
        assert_eq!(form.full_name, "Jane Doe");
        assert_eq!(form.age, 34);
        assert_eq!(form.blood_type, BloodType::OPositive);
        assert_eq!(form.kind(), EntityKind::Patient);
        assert_eq!(
            form.details,
            EntityDetails::Patient { organ_needed: Organ::Kidney, urgency: Urgency::High }
        );
        assert!(form.medical_history.is_none());
    }

    #[test]
    fn test_valid_donor_form_dedupes_organs() {
        let form = donor_draft().validate().unwrap();
        assert_eq!(form.kind(), EntityKind::Donor);
        assert_eq!(form.blood_type, BloodType::ABNegative);
        assert_eq!(
            form.details,
            EntityDetails::Donor {
                organs_pledged: vec![Organ::Kidney, Organ::Liver, Organ::BoneMarrow]
            }
        );
    }

    #[test]
    fn test_empty_draft_reports_every_required_field() {
        let errors = FormDraft::new(EntityKind::Patient).validate().unwrap_err();
        for field in [
            FormField::FullName,
            FormField::Age,
            FormField::Gender,
            FormField::BloodType,
            FormField::Phone,
            FormField::Email,
            FormField::Address,
            FormField::OrganNeeded,
            FormField::Urgency,
        ] {
            assert!(errors.has_error_for(field.name()), "missing error for {}", field);
        }
        assert!(!errors.has_error_for(FormField::OrgansPledged.name()));
        assert!(errors.errors.iter().all(|e| e.code == ValidationErrorCode::Required));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let mut draft = patient_draft();
        draft.set(FormField::Phone, "   ").set(FormField::Email, "");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.has_error_for("phone"));
        assert!(errors.has_error_for("email"));
    }

    #[test]
    fn test_age_range() {
        assert_eq!(parse_age("1").unwrap(), 1);
        assert_eq!(parse_age(" 120 ").unwrap(), 120);

        let errors = parse_age("0").unwrap_err();
        assert_eq!(errors.errors[0].code, ValidationErrorCode::OutOfRange);

        let errors = parse_age("121").unwrap_err();
        assert_eq!(errors.errors[0].code, ValidationErrorCode::OutOfRange);

        let errors = parse_age("thirty").unwrap_err();
        assert_eq!(errors.errors[0].code, ValidationErrorCode::InvalidFormat);

        let errors = parse_age("34.5").unwrap_err();
        assert_eq!(errors.errors[0].code, ValidationErrorCode::InvalidFormat);
    }

    #[test]
    fn test_age_out_of_range_rejects_form() {
        let mut draft = patient_draft();
        draft.set(FormField::Age, "150");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].field, "age");
    }

    #[test]
    fn test_unknown_enumerations() {
        let mut draft = patient_draft();
        draft
            .set(FormField::BloodType, "C+")
            .set(FormField::OrganNeeded, "spleen")
            .set(FormField::Urgency, "whenever");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 3);
        assert!(errors.errors.iter().all(|e| e.code == ValidationErrorCode::InvalidFormat));
    }

    #[test]
    fn test_donor_with_only_unknown_organs() {
        let mut draft = donor_draft();
        draft.set(FormField::OrgansPledged, "spleen, appendix");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.has_error_for("organs_pledged"));
    }

    #[test]
    fn test_donor_with_separators_only() {
        let mut draft = donor_draft();
        draft.set(FormField::OrgansPledged, " , ,");
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].code, ValidationErrorCode::Required);
    }

    #[test]
    fn test_submission_requires_document() {
        let errors = validate_submission(&patient_draft(), false).unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].field, "document");

        assert!(validate_submission(&patient_draft(), true).is_ok());
    }

    #[test]
    fn test_submission_merges_document_and_field_errors() {
        let mut draft = patient_draft();
        draft.clear(FormField::FullName);
        let errors = validate_submission(&draft, false).unwrap_err();
        assert!(errors.has_error_for("full_name"));
        assert!(errors.has_error_for("document"));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_valid());
        assert!(validate_email("first.last+tag@hospital.example.org").is_valid());

        assert!(!validate_email("").is_valid());
        assert!(!validate_email("no-at-sign.org").is_valid());
        assert!(!validate_email("two@@example.org").is_valid());
        assert!(!validate_email("@example.org").is_valid());
        assert!(!validate_email("jane@localhost").is_valid());
        assert!(!validate_email("jane@example..org").is_valid());
        assert!(!validate_email("jane doe@example.org").is_valid());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("5550100").is_valid());
        assert!(validate_phone("+44 20 7946 0958").is_valid());
        assert!(validate_phone("(555) 010.2030").is_valid());

        let result = validate_phone("12345");
        assert_eq!(result.errors[0].code, ValidationErrorCode::TooShort);

        let result = validate_phone("1234567890123456");
        assert_eq!(result.errors[0].code, ValidationErrorCode::TooLong);

        let result = validate_phone("555-CALL-NOW");
        assert_eq!(result.errors[0].code, ValidationErrorCode::InvalidFormat);
    }

    #[test]
    fn test_form_field_names_round_trip() {
        for field in FormField::ALL {
            assert_eq!(FormField::from_name(field.name()), Some(field));
        }
        assert_eq!(FormField::from_name("ssn"), None);
    }

    #[test]
    fn test_kind_specific_fields() {
        assert!(FormField::Urgency.applies_to(EntityKind::Patient));
        assert!(!FormField::Urgency.applies_to(EntityKind::Donor));
        assert!(FormField::OrgansPledged.applies_to(EntityKind::Donor));
        assert!(FormField::Email.applies_to(EntityKind::Donor));
    }

    #[test]
    fn test_form_serialization_shape() {
        let form = patient_draft().validate().unwrap();
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["entity_type"], "patient");
        assert_eq!(json["blood_type"], "O+");
        assert_eq!(json["organ_needed"], "kidney");
        assert_eq!(json["urgency"], "high");
        assert_eq!(json["contact"]["email"], "jane.doe@example.org");
        assert!(json.get("medical_history").is_none());

        let back: RegistrationForm = serde_json::from_value(json).unwrap();
        assert_eq!(back, form);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_age_accepted_iff_in_range(age in -1000i64..1000) {
            let accepted = parse_age(&age.to_string()).is_ok();
            prop_assert_eq!(accepted, (MIN_AGE..=MAX_AGE).contains(&age));
        }

        #[test]
        fn prop_validation_never_panics(
            name in ".{0,200}",
            age in ".{0,6}",
            email in ".{0,40}",
            phone in ".{0,30}",
        ) {
            let mut draft = FormDraft::new(EntityKind::Patient);
            draft
                .set(FormField::FullName, name)
                .set(FormField::Age, age)
                .set(FormField::Email, email)
                .set(FormField::Phone, phone);
            // Required patient fields are missing, so this can never pass
            prop_assert!(draft.validate().is_err());
        }
    }
}
