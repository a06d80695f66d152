//! Declarative input rules for every entity a user edits.
//!
//! Each schema is a plain struct deriving [`Validate`]; the functions here run
//! those rules and flatten the result into an ordered list of
//! [`FieldViolation`]s (schema field order, then rule order within a field).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{Category, ProductDraft};

/// Characters accepted as the special-character part of a password.
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^*+=-";

/// Minimum password length, counted in characters.
pub const PASSWORD_MIN_LENGTH: usize = 10;

/// A single problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Ordered field violations for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(Vec<FieldViolation>);

impl Violations {
    pub fn push(&mut self, violation: FieldViolation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldViolation> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<FieldViolation> {
        self.0.clone()
    }

    /// Names of the offending fields, in order, without duplicates.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for violation in &self.0 {
            if !fields.contains(&violation.field.as_str()) {
                fields.push(&violation.field);
            }
        }
        fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    fn from_errors(order: &[&'static str], errors: &ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut violations = Vec::new();

        for field in order {
            if let Some(list) = field_errors.get(field) {
                violations.extend(list.iter().map(|err| FieldViolation::new(*field, reason(err))));
            }
        }

        let mut rest: Vec<_> = field_errors
            .iter()
            .filter(|(field, _)| !order.contains(*field))
            .collect();
        rest.sort_by_key(|(field, _)| **field);
        for (field, list) in rest {
            violations.extend(list.iter().map(|err| FieldViolation::new(*field, reason(err))));
        }

        Self(violations)
    }
}

impl From<Vec<FieldViolation>> for Violations {
    fn from(violations: Vec<FieldViolation>) -> Self {
        Self(violations)
    }
}

impl IntoIterator for Violations {
    type Item = FieldViolation;
    type IntoIter = std::vec::IntoIter<FieldViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

fn reason(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|msg| msg.to_string())
        .unwrap_or_else(|| format!("failed the '{}' rule", err.code))
}

/// Login form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Email format is invalid"))]
    pub email: String,

    #[validate(
        length(min = 10, message = "Password must be at least 10 characters"),
        custom = "validate_password_strength"
    )]
    pub password: String,
}

impl Credentials {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

/// Sign-up form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "Email format is invalid"))]
    pub email: String,

    #[serde(default)]
    pub nickname: String,

    #[validate(
        length(min = 10, message = "Password must be at least 10 characters"),
        custom = "validate_password_strength"
    )]
    pub password: String,

    #[validate(
        length(min = 10, message = "Password must be at least 10 characters"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    pub check_password: String,

    #[serde(default)]
    pub is_seller: bool,
}

impl Registration {
    const FIELDS: &'static [&'static str] = &["email", "nickname", "password", "check_password"];
}

/// Product form values as entered by a seller, before they are typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProductForm {
    #[validate(length(min = 1, message = "Name needs at least one character"))]
    pub name: String,

    #[validate(range(min = 1, message = "Price must be at least 1"))]
    pub price: i64,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i64,

    #[validate(length(min = 1, message = "Description needs at least one character"))]
    pub description: String,

    #[validate(custom = "validate_category")]
    pub category: String,
}

impl ProductForm {
    const FIELDS: &'static [&'static str] =
        &["name", "price", "quantity", "description", "category"];
}

impl From<ProductDraft> for ProductForm {
    fn from(draft: ProductDraft) -> Self {
        Self {
            name: draft.name,
            price: draft.price,
            quantity: draft.quantity,
            description: draft.description,
            category: draft.category.to_string(),
        }
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c));

    if has_letter && has_digit && has_special {
        return Ok(());
    }

    let mut err = ValidationError::new("password_strength");
    err.message = Some(
        format!(
            "Password must combine letters, digits and one of {}",
            PASSWORD_SPECIAL_CHARS
        )
        .into(),
    );
    Err(err)
}

fn validate_category(value: &str) -> Result<(), ValidationError> {
    if Category::from_str(value).is_ok() {
        return Ok(());
    }

    let mut err = ValidationError::new("category");
    err.message = Some("Please choose a category".into());
    Err(err)
}

pub fn validate_credentials(candidate: &Credentials) -> Result<(), Violations> {
    candidate
        .validate()
        .map_err(|errors| Violations::from_errors(Credentials::FIELDS, &errors))
}

pub fn validate_registration(candidate: &Registration) -> Result<(), Violations> {
    candidate
        .validate()
        .map_err(|errors| Violations::from_errors(Registration::FIELDS, &errors))
}

/// Checks a product form and returns its typed draft on acceptance.
pub fn validate_product(candidate: &ProductForm) -> Result<ProductDraft, Violations> {
    candidate
        .validate()
        .map_err(|errors| Violations::from_errors(ProductForm::FIELDS, &errors))?;

    let category = Category::from_str(&candidate.category).map_err(|_| {
        Violations::from(vec![FieldViolation::new(
            "category",
            "Please choose a category",
        )])
    })?;

    Ok(ProductDraft {
        name: candidate.name.clone(),
        price: candidate.price,
        quantity: candidate.quantity,
        description: candidate.description.clone(),
        category,
    })
}
