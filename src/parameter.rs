//! # Parameters
//!
//! Value types describing configuration intent (`Parameter`) and the state the
//! remote store reports back (`RemoteParameter`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parameter value type
///
/// Serialized with the Parameter Store type names so CSV files and rollback
/// snapshots stay readable by people who know the AWS console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterType {
    /// Plain string (`String`)
    #[default]
    #[serde(rename = "String")]
    PlainText,
    /// KMS-encrypted string (`SecureString`)
    #[serde(rename = "SecureString")]
    Encrypted,
    /// Comma-joined list of non-empty elements (`StringList`)
    #[serde(rename = "StringList")]
    List,
}

impl ParameterType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::PlainText => "String",
            ParameterType::Encrypted => "SecureString",
            ParameterType::List => "StringList",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = String;

    /// Accepts the Parameter Store names as well as the descriptive aliases,
    /// case-insensitively. An empty string means `String`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "string" | "plaintext" | "plain" => Ok(ParameterType::PlainText),
            "securestring" | "encrypted" | "secure" => Ok(ParameterType::Encrypted),
            "stringlist" | "list" => Ok(ParameterType::List),
            other => Err(format!(
                "unknown parameter type '{other}' (expected String, SecureString or StringList)"
            )),
        }
    }
}

/// A single resource tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Desired state of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub parameter_type: ParameterType,
    /// Empty string means "not set"
    pub description: String,
    pub key_id: Option<String>,
    pub tags: Vec<Tag>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, parameter_type: ParameterType) -> Self {
        self.parameter_type = parameter_type;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Value suitable for logs and previews
    #[must_use]
    pub fn display_value(&self) -> String {
        display_value(&self.value, self.parameter_type)
    }
}

/// Parameter as reported by the remote store
///
/// `version`, `last_modified_*` are assigned by the store and never written by
/// this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParameter {
    pub parameter: Parameter,
    pub version: i64,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub last_modified_user: Option<String>,
}

impl RemoteParameter {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.parameter.name
    }
}

/// Treat `None` and `Some("")` as the same unset value
#[must_use]
pub fn normalize_optional(value: Option<&str>) -> &str {
    value.map_or("", str::trim)
}

/// Order-independent tag-set equality
///
/// Both sides are sorted by key and compared pairwise; a different number of
/// tags means the sets differ.
#[must_use]
pub fn tags_equal(left: &[Tag], right: &[Tag]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    let mut left_sorted: Vec<&Tag> = left.iter().collect();
    let mut right_sorted: Vec<&Tag> = right.iter().collect();
    left_sorted.sort();
    right_sorted.sort();

    left_sorted
        .iter()
        .zip(right_sorted.iter())
        .all(|(l, r)| l.key == r.key && l.value == r.value)
}

/// Mask a value for display
///
/// Encrypted values are always hidden. Other values are shown, truncated when long.
#[must_use]
pub fn display_value(value: &str, parameter_type: ParameterType) -> String {
    if parameter_type == ParameterType::Encrypted {
        return mask_value(value);
    }

    const MAX_DISPLAY_CHARS: usize = 50;
    if value.chars().count() > MAX_DISPLAY_CHARS {
        let truncated: String = value.chars().take(MAX_DISPLAY_CHARS).collect();
        format!("{truncated}...")
    } else {
        value.to_string()
    }
}

/// Mask value for logging (show first and last few characters)
#[must_use]
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        // Very short values - mask completely
        "*".repeat(chars.len().min(4))
    } else {
        // Show first 2 and last 2 characters
        let first: String = chars[..2].iter().collect();
        let last: String = chars[chars.len() - 2..].iter().collect();
        format!("{first}****{last}")
    }
}
