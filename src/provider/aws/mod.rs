//! # AWS Provider
//!
//! SDK configuration and error classification shared by the AWS-backed store.
//!
//! Credentials come from the default AWS provider chain (environment,
//! shared config/credentials files with an optional profile, SSO, IMDS).
//! This module never resolves credentials itself.

use crate::error::StoreError;
use anyhow::{Context, Result};
use aws_config::SdkConfig;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use tracing::{debug, info};

pub mod parameter_store;

pub use parameter_store::AwsParameterStore;

/// Load SDK config for the given region and profile
///
/// When `region` is `None` the provider chain decides (`AWS_REGION`, profile
/// config). Fails when no region can be resolved or no credentials provider is
/// available, since nothing can be done against the store in that case.
pub async fn load_sdk_config(region: Option<&str>, profile: Option<&str>) -> Result<SdkConfig> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    if let Some(profile) = profile {
        info!("Using AWS profile: {}", profile);
        loader = loader.profile_name(profile);
    }

    let sdk_config = loader.load().await;

    sdk_config
        .region()
        .context("No AWS region configured. Pass --region or set AWS_REGION.")?;
    sdk_config.credentials_provider().context(
        "No AWS credentials provider available. Configure credentials or pass --profile.",
    )?;

    debug!("AWS SDK config loaded for region {:?}", sdk_config.region());
    Ok(sdk_config)
}

/// Map an SDK error onto the store taxonomy using the service error code
pub(crate) fn classify_error<E, R>(error: &SdkError<E, R>, name: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(error).to_string();

    match error.code() {
        Some("ParameterNotFound") => StoreError::NotFound(name.to_string()),
        Some("ParameterAlreadyExists") => StoreError::AlreadyExists(name.to_string()),
        Some(
            "ThrottlingException" | "Throttling" | "TooManyUpdates" | "RequestLimitExceeded",
        ) => StoreError::Throttled(detail),
        Some("AccessDeniedException" | "AccessDenied" | "UnauthorizedOperation") => {
            StoreError::AccessDenied(detail)
        }
        Some(
            "ValidationException"
            | "InvalidKeyId"
            | "ParameterPatternMismatchException"
            | "HierarchyLevelLimitExceededException"
            | "HierarchyTypeMismatchException"
            | "UnsupportedParameterType"
            | "InvalidAllowedPatternException"
            | "ParameterLimitExceeded"
            | "TooManyTagsError",
        ) => StoreError::Validation(detail),
        _ => StoreError::Other(detail),
    }
}
