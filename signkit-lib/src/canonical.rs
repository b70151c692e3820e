//! Canonical serialization of request fields.
//!
//! Both parties to a signed exchange must derive byte-identical strings from
//! an unordered field mapping without ever exchanging an ordering, so the
//! sort and the exclusion rules below are part of the wire contract.
//!
//! # Canonical Form
//!
//! `name=value&name=value&...`
//!
//! Fields are sorted by name (case-insensitive fold by default), rendered
//! without any escaping, and joined with `&`. Values must therefore not
//! contain the `&` or `=` separator characters; that precondition is the
//! caller's to uphold.
//!
//! Excluded from the canonical string:
//! - the signature field itself (a signature cannot sign itself),
//! - any field in the configured exclude set,
//! - `null` and empty-string values,
//! - nested objects and arrays (opaque payloads never participate),
//! - names starting with `_`, unless listed in the include set.

use std::collections::HashSet;

use serde_json::Value;

use crate::Message;

/// Reserved prefix marking a field as private to the transport layer.
const PRIVATE_PREFIX: char = '_';

/// Field selection and ordering rules for canonical strings.
///
/// Owned by a `Signer`, but usable standalone when a caller needs the
/// canonical form without producing a signature (e.g. for logging a
/// signing mismatch against a partner).
#[derive(Debug, Clone)]
pub struct CanonicalRules {
    sign_field: String,
    ignore_case: bool,
    exclude: HashSet<String>,
    include: HashSet<String>,
}

impl CanonicalRules {
    /// Create rules excluding `sign_field` and nothing else, with
    /// case-insensitive ordering.
    pub fn new(sign_field: impl Into<String>) -> Self {
        let sign_field = sign_field.into();
        let mut exclude = HashSet::new();
        exclude.insert(sign_field.clone());
        Self {
            sign_field,
            ignore_case: true,
            exclude,
            include: HashSet::new(),
        }
    }

    /// Switch between case-insensitive (default) and byte-wise ordering.
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Add field names that never participate in signing.
    ///
    /// The signature field stays excluded regardless of this set.
    pub fn exclude_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add `_`-prefixed field names that participate in signing anyway.
    pub fn include_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(names.into_iter().map(Into::into));
        self
    }

    /// Name of the field holding the computed signature.
    pub fn sign_field(&self) -> &str {
        &self.sign_field
    }

    /// Build the canonical string for `data`.
    ///
    /// Deterministic: the same logical mapping always yields the same
    /// string. A mapping with no eligible fields yields the empty string.
    pub fn canonical_string(&self, data: &Message) -> String {
        let mut fields: Vec<(&str, String)> = data
            .iter()
            .filter(|(name, value)| self.is_eligible(name, value))
            .filter_map(|(name, value)| render_value(value).map(|v| (name.as_str(), v)))
            .collect();

        if self.ignore_case {
            // Fold for ordering only; original-case names are preserved in
            // the output. Raw name breaks ties between fold-equal names.
            fields.sort_by(|a, b| {
                a.0.to_lowercase()
                    .cmp(&b.0.to_lowercase())
                    .then_with(|| a.0.cmp(b.0))
            });
        } else {
            fields.sort_by(|a, b| a.0.cmp(b.0));
        }

        let rendered: Vec<String> = fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        rendered.join("&")
    }

    fn is_eligible(&self, name: &str, value: &Value) -> bool {
        if name.is_empty() || self.exclude.contains(name) {
            return false;
        }
        if name.starts_with(PRIVATE_PREFIX) && !self.include.contains(name) {
            return false;
        }
        !matches!(value, Value::Null | Value::Object(_) | Value::Array(_))
    }
}

/// Literal string form of a scalar value, or `None` for values that never
/// participate in signing.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) | Value::Array(_) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
    }
}
