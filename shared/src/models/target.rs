//! Watched target data model.
//!
//! A target is one ClickHouse installation (CHI), identified by the Kubernetes
//! namespace and name it lives under, with one network address per host.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use validator::Validate;

/// Identity of a watched installation.
///
/// Ordered by namespace first, then name, which is also the order in which
/// the registry lists targets.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Validate,
)]
pub struct TargetKey {
    /// Namespace the installation belongs to.
    #[serde(default)]
    #[validate(length(min = 1, message = "Namespace cannot be empty"))]
    pub namespace: String,

    /// Installation name, unique within its namespace.
    #[serde(default)]
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
}

impl TargetKey {
    /// Creates a new target key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Validates that both identity fields are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or the name is empty or blank.
    pub fn validate_key(&self) -> Result<(), TargetValidationError> {
        if self.namespace.trim().is_empty() {
            return Err(TargetValidationError::EmptyNamespace);
        }
        if self.name.trim().is_empty() {
            return Err(TargetValidationError::EmptyName);
        }
        self.validate()?;
        Ok(())
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A watched installation and the addresses of its hosts.
///
/// Serializes flat as `{"namespace", "name", "addresses"}`. The operator's
/// historical field name `hostnames` is accepted on input.
///
/// # Example
///
/// ```
/// use shared::models::Target;
///
/// let target = Target::new("default", "chi-a", vec!["10.0.0.1:9000".to_string()]);
///
/// assert!(target.validate_target().is_ok());
/// assert!(target.is_watched());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Target {
    /// Identity of the installation.
    #[serde(flatten)]
    #[validate(nested)]
    pub key: TargetKey,

    /// Host addresses, one per replica or shard member.
    #[serde(default, alias = "hostnames")]
    pub addresses: Vec<String>,
}

/// Errors that can occur during target validation.
#[derive(Debug, Error)]
pub enum TargetValidationError {
    /// The namespace is missing or blank.
    #[error("Namespace cannot be empty")]
    EmptyNamespace,

    /// The name is missing or blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl TargetValidationError {
    /// Name of the request field that failed validation.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyNamespace => "namespace",
            Self::EmptyName => "name",
            Self::ValidationError(_) => "unknown",
        }
    }
}

impl Target {
    /// Creates a new target.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        addresses: Vec<String>,
    ) -> Self {
        Self {
            key: TargetKey::new(namespace, name),
            addresses,
        }
    }

    /// Returns `false` when the address list is empty; such a target is
    /// equivalent to one that is not watched at all.
    #[must_use]
    pub fn is_watched(&self) -> bool {
        !self.addresses.is_empty()
    }

    /// Validates the target identity.
    ///
    /// Addresses are not validated here: an empty list is a legal request.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or the name is empty.
    pub fn validate_target(&self) -> Result<(), TargetValidationError> {
        self.key.validate_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_serializes_flat() {
        let target = Target::new("default", "chi-a", vec!["10.0.0.1:9000".to_string()]);
        let value = serde_json::to_value(&target).unwrap();

        assert_eq!(
            value,
            json!({"namespace": "default", "name": "chi-a", "addresses": ["10.0.0.1:9000"]})
        );
    }

    #[test]
    fn test_target_accepts_hostnames_alias() {
        let target: Target = serde_json::from_value(json!({
            "namespace": "prod",
            "name": "events",
            "hostnames": ["chi-events-0-0", "chi-events-0-1"]
        }))
        .unwrap();

        assert_eq!(target.key, TargetKey::new("prod", "events"));
        assert_eq!(target.addresses.len(), 2);
    }

    #[test]
    fn test_target_missing_fields_default_to_empty() {
        let target: Target = serde_json::from_value(json!({"name": "chi-a"})).unwrap();

        assert!(target.key.namespace.is_empty());
        assert!(target.addresses.is_empty());
        assert!(!target.is_watched());
    }

    #[test]
    fn test_validate_rejects_empty_namespace() {
        let target = Target::new("", "chi-a", vec![]);
        let err = target.validate_target().unwrap_err();

        assert!(matches!(err, TargetValidationError::EmptyNamespace));
        assert_eq!(err.field(), "namespace");
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let target = Target::new("default", "   ", vec![]);

        assert!(matches!(
            target.validate_target(),
            Err(TargetValidationError::EmptyName)
        ));
    }

    #[test]
    fn test_validate_accepts_empty_addresses() {
        let target = Target::new("default", "chi-a", vec![]);
        assert!(target.validate_target().is_ok());
    }

    #[test]
    fn test_key_ordering_and_display() {
        let mut keys = vec![
            TargetKey::new("b", "a"),
            TargetKey::new("a", "z"),
            TargetKey::new("a", "b"),
        ];
        keys.sort();

        assert_eq!(keys[0].to_string(), "a/b");
        assert_eq!(keys[1].to_string(), "a/z");
        assert_eq!(keys[2].to_string(), "b/a");
    }
}
