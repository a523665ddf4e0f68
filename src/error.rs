// Copyright 2023 Remi Bernotavicius

use diesel::result::DatabaseErrorKind;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const FIELD_REQUIRED: &str = "This field is required.";

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("amount of {ingredient} must be at least 1")]
    InvalidAmount { ingredient: String },

    #[error("{ingredient} is listed more than once")]
    DuplicateIngredient { ingredient: String },

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("only the author may change this recipe")]
    Forbidden,

    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("recipe already added")]
    AlreadyExists,

    #[error("recipe already removed")]
    AlreadyDeleted,

    #[error("{0} already exists")]
    Conflict(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Validation failures keyed by the offending request field, or `None` for errors that are
    /// not about a particular field.
    pub fn field_errors(&self) -> Option<BTreeMap<&'static str, Vec<String>>> {
        let mut errors = BTreeMap::new();
        match self {
            Self::MissingFields(fields) => {
                for field in fields {
                    errors.insert(*field, vec![FIELD_REQUIRED.to_owned()]);
                }
            }
            Self::InvalidField { field, message } => {
                errors.insert(*field, vec![message.clone()]);
            }
            Self::InvalidAmount { .. } | Self::DuplicateIngredient { .. } => {
                errors.insert("ingredients", vec![self.to_string()]);
            }
            _ => return None,
        }
        Some(errors)
    }
}

pub fn is_unique_violation(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

#[test]
fn missing_fields_are_keyed_by_field() {
    let error = Error::MissingFields(vec!["name", "text"]);
    let errors = error.field_errors().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors["name"], vec![FIELD_REQUIRED.to_owned()]);
    assert_eq!(errors["text"], vec![FIELD_REQUIRED.to_owned()]);
}

#[test]
fn ingredient_errors_land_on_ingredients_field() {
    let error = Error::DuplicateIngredient {
        ingredient: "salt".into(),
    };
    assert_eq!(
        error.field_errors().unwrap()["ingredients"],
        vec!["salt is listed more than once".to_owned()]
    );
    assert!(Error::AlreadyExists.field_errors().is_none());
}
