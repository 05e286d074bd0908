//! # Parameter Validation
//!
//! Validates parameter names, values, descriptions, encryption key references
//! and tags against Parameter Store constraints before anything is written.

use crate::constants::{
    MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH, MAX_TAG_KEY_LENGTH, MAX_TAG_VALUE_LENGTH,
};
use crate::parameter::{Parameter, ParameterType, Tag};
use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

static NAME_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_./-]+$").expect("parameter name regex is valid")
});

static KEY_ID_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("key id regex is valid")
});

static KEY_ID_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^alias/[A-Za-z0-9/_-]+$").expect("key alias regex is valid")
});

static KEY_ID_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^arn:aws[A-Za-z-]*:kms:[a-z0-9-]+:\d{12}:(key/[0-9a-fA-F-]{36}|alias/[A-Za-z0-9/_-]+)$",
    )
    .expect("key arn regex is valid")
});

static TAG_VALUE_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N} .:/=+\-@]*$").expect("tag value regex is valid")
});

/// Validate a parameter name
/// Must start with `/`, use only `[A-Za-z0-9_./-]`, contain no `//`
/// and not end with `/` (the root `/` itself is allowed)
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow::anyhow!("parameter name cannot be empty"));
    }

    if !name.starts_with('/') {
        return Err(anyhow::anyhow!("parameter name '{name}' must start with '/'"));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(anyhow::anyhow!(
            "parameter name exceeds maximum length of {} characters (got {})",
            MAX_NAME_LENGTH,
            name.chars().count()
        ));
    }

    if !NAME_CHARSET.is_match(name) {
        return Err(anyhow::anyhow!(
            "parameter name '{name}' must contain only letters, digits, '_', '.', '-' and '/'"
        ));
    }

    if name.contains("//") {
        return Err(anyhow::anyhow!(
            "parameter name '{name}' must not contain consecutive slashes"
        ));
    }

    if name.len() > 1 && name.ends_with('/') {
        return Err(anyhow::anyhow!(
            "parameter name '{name}' must not end with '/'"
        ));
    }

    Ok(())
}

/// Validate a parameter value for its type
pub fn validate_value(value: &str, parameter_type: ParameterType) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow::anyhow!("parameter value cannot be empty"));
    }

    if parameter_type == ParameterType::List
        && value.split(',').any(|element| element.trim().is_empty())
    {
        return Err(anyhow::anyhow!(
            "StringList value '{value}' contains an empty element"
        ));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    let length = description.chars().count();
    if length > MAX_DESCRIPTION_LENGTH {
        return Err(anyhow::anyhow!(
            "description exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters (got {length})"
        ));
    }
    Ok(())
}

/// Validate an encryption key reference: a key id (UUID), an alias or a full ARN
pub fn validate_key_id(key_id: &str) -> Result<()> {
    if KEY_ID_UUID.is_match(key_id) || KEY_ID_ALIAS.is_match(key_id) || KEY_ID_ARN.is_match(key_id)
    {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "encryption key '{key_id}' is not a key id, 'alias/...' or a KMS ARN"
    ))
}

pub fn validate_tag(tag: &Tag) -> Result<()> {
    if tag.key.trim().is_empty() {
        return Err(anyhow::anyhow!("tag key cannot be empty"));
    }

    if tag.key.chars().count() > MAX_TAG_KEY_LENGTH {
        return Err(anyhow::anyhow!(
            "tag key '{}' exceeds maximum length of {} characters",
            tag.key,
            MAX_TAG_KEY_LENGTH
        ));
    }

    if tag.value.chars().count() > MAX_TAG_VALUE_LENGTH {
        return Err(anyhow::anyhow!(
            "tag '{}' value exceeds maximum length of {} characters",
            tag.key,
            MAX_TAG_VALUE_LENGTH
        ));
    }

    if !TAG_VALUE_CHARSET.is_match(&tag.value) {
        return Err(anyhow::anyhow!(
            "tag '{}' value '{}' may only contain letters, digits, spaces and . : / = + - @",
            tag.key,
            tag.value
        ));
    }

    Ok(())
}

/// Run every check against a parameter and collect all failures
#[must_use]
pub fn validate_parameter(parameter: &Parameter) -> Vec<String> {
    let mut errors = Vec::new();

    if let Err(e) = validate_name(&parameter.name) {
        errors.push(e.to_string());
    }
    if let Err(e) = validate_value(&parameter.value, parameter.parameter_type) {
        errors.push(e.to_string());
    }
    if let Err(e) = validate_description(&parameter.description) {
        errors.push(e.to_string());
    }
    if let Some(key_id) = parameter.key_id.as_deref().filter(|k| !k.is_empty()) {
        if parameter.parameter_type == ParameterType::Encrypted {
            if let Err(e) = validate_key_id(key_id) {
                errors.push(e.to_string());
            }
        } else {
            errors.push(format!(
                "encryption key is only allowed for SecureString parameters (type is {})",
                parameter.parameter_type
            ));
        }
    }
    for tag in &parameter.tags {
        if let Err(e) = validate_tag(tag) {
            errors.push(e.to_string());
        }
    }

    errors
}
