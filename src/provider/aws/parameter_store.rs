//! # AWS Parameter Store Client
//!
//! [`ParameterStore`] implementation backed by AWS Systems Manager Parameter Store.
//!
//! A full read combines three calls: `GetParameter` (value, type, version),
//! `DescribeParameters` (description, KMS key, last modifying user) and
//! `ListTagsForResource` (tags, best effort).

use super::{classify_error, load_sdk_config};
use crate::error::StoreError;
use crate::parameter::{Parameter, ParameterType, RemoteParameter, Tag};
use crate::provider::ParameterStore;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_ssm::types::{
    Parameter as SsmParameter, ParameterMetadata, ParameterStringFilter,
    ParameterType as SsmParameterType, ResourceTypeForTagging, Tag as SsmTag,
};
use aws_sdk_ssm::operation::put_parameter::builders::PutParameterFluentBuilder;
use aws_sdk_ssm::Client as SsmClient;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use std::collections::VecDeque;
use tracing::{debug, info};

/// AWS Parameter Store implementation
pub struct AwsParameterStore {
    client: SsmClient,
    region: String,
}

impl std::fmt::Debug for AwsParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsParameterStore")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsParameterStore {
    /// Create a new AWS Parameter Store client
    ///
    /// # Errors
    ///
    /// Fails when no region or credentials provider can be resolved.
    pub async fn connect(region: Option<&str>, profile: Option<&str>) -> Result<Self> {
        let sdk_config = load_sdk_config(region, profile).await?;
        let region = sdk_config
            .region()
            .map(ToString::to_string)
            .unwrap_or_default();

        info!("AWS Parameter Store region: {}", region);

        Ok(Self {
            client: SsmClient::new(&sdk_config),
            region,
        })
    }

    /// Wrap an already configured SDK client
    #[must_use]
    pub fn from_client(client: SsmClient, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Region this client talks to
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    async fn describe(&self, name: &str) -> Result<Option<ParameterMetadata>, StoreError> {
        let filter = ParameterStringFilter::builder()
            .key("Name")
            .option("Equals")
            .values(name)
            .build()
            .map_err(|e| StoreError::Other(format!("invalid describe filter: {e}")))?;

        let output = self
            .client
            .describe_parameters()
            .parameter_filters(filter)
            .send()
            .await
            .map_err(|e| classify_error(&e, name))?;

        Ok(output.parameters().first().cloned())
    }

    fn put_request(
        &self,
        parameter: &Parameter,
        overwrite: bool,
    ) -> Result<PutParameterFluentBuilder, StoreError> {
        let mut request = self
            .client
            .put_parameter()
            .name(&parameter.name)
            .value(&parameter.value)
            .r#type(to_ssm_type(parameter.parameter_type))
            .overwrite(overwrite);

        // An omitted description keeps the stored one, so an overwrite always sends it
        if overwrite || !parameter.description.is_empty() {
            request = request.description(&parameter.description);
        }
        if let Some(key_id) = parameter.key_id.as_deref().filter(|k| !k.is_empty()) {
            request = request.key_id(key_id);
        }
        // PutParameter rejects tags together with Overwrite
        if !overwrite && !parameter.tags.is_empty() {
            request = request.set_tags(Some(to_ssm_tags(&parameter.tags)?));
        }

        Ok(request)
    }
}

fn to_ssm_type(parameter_type: ParameterType) -> SsmParameterType {
    match parameter_type {
        ParameterType::PlainText => SsmParameterType::String,
        ParameterType::Encrypted => SsmParameterType::SecureString,
        ParameterType::List => SsmParameterType::StringList,
    }
}

fn from_ssm_type(parameter_type: Option<&SsmParameterType>) -> ParameterType {
    match parameter_type {
        Some(SsmParameterType::SecureString) => ParameterType::Encrypted,
        Some(SsmParameterType::StringList) => ParameterType::List,
        _ => ParameterType::PlainText,
    }
}

fn to_ssm_tags(tags: &[Tag]) -> Result<Vec<SsmTag>, StoreError> {
    tags.iter()
        .map(|tag| {
            SsmTag::builder()
                .key(&tag.key)
                .value(&tag.value)
                .build()
                .map_err(|e| StoreError::Validation(format!("invalid tag '{}': {e}", tag.key)))
        })
        .collect()
}

fn to_chrono(date: Option<&aws_sdk_ssm::primitives::DateTime>) -> Option<DateTime<Utc>> {
    date.and_then(|d| DateTime::<Utc>::from_timestamp(d.secs(), d.subsec_nanos()))
}

/// Convert a listed parameter; description, key and tags are not part of a listing
fn remote_from_ssm(parameter: &SsmParameter) -> RemoteParameter {
    RemoteParameter {
        parameter: Parameter {
            name: parameter.name().unwrap_or_default().to_string(),
            value: parameter.value().unwrap_or_default().to_string(),
            parameter_type: from_ssm_type(parameter.r#type()),
            ..Parameter::default()
        },
        version: parameter.version(),
        last_modified_date: to_chrono(parameter.last_modified_date()),
        last_modified_user: None,
    }
}

#[async_trait]
impl ParameterStore for AwsParameterStore {
    async fn get(&self, name: &str) -> Result<RemoteParameter, StoreError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true) // Decrypt SecureString parameters
            .send()
            .await
            .map_err(|e| classify_error(&e, name))?;

        let parameter = output
            .parameter()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let mut remote = remote_from_ssm(parameter);

        if let Some(metadata) = self.describe(name).await? {
            remote.parameter.description = metadata.description().unwrap_or_default().to_string();
            remote.parameter.key_id = metadata
                .key_id()
                .filter(|k| !k.is_empty())
                .map(ToString::to_string);
            remote.last_modified_user = metadata.last_modified_user().map(ToString::to_string);
        }
        remote.parameter.tags = self.get_tags(name).await;

        Ok(remote)
    }

    async fn put(&self, parameter: &Parameter, overwrite: bool) -> Result<(), StoreError> {
        self.put_request(parameter, overwrite)?
            .send()
            .await
            .map_err(|e| classify_error(&e, &parameter.name))?;

        debug!(
            parameter = parameter.name.as_str(),
            overwrite = overwrite,
            "Wrote AWS Parameter Store parameter"
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| classify_error(&e, name))?;
        Ok(())
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<RemoteParameter, StoreError>> {
        let pages = self
            .client
            .get_parameters_by_path()
            .path(prefix)
            .recursive(recursive)
            .with_decryption(true)
            .into_paginator()
            .send();

        // Pages are fetched on demand as the stream is polled
        Box::pin(stream::unfold(
            (pages, VecDeque::<SsmParameter>::new()),
            move |(mut pages, mut pending)| async move {
                loop {
                    if let Some(parameter) = pending.pop_front() {
                        let remote = remote_from_ssm(&parameter);
                        return Some((Ok(remote), (pages, pending)));
                    }
                    match pages.next().await? {
                        Ok(page) => pending.extend(page.parameters().iter().cloned()),
                        Err(e) => {
                            let error = classify_error(&e, prefix);
                            return Some((Err(error), (pages, pending)));
                        }
                    }
                }
            },
        ))
    }

    async fn get_tags(&self, name: &str) -> Vec<Tag> {
        match self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .send()
            .await
        {
            Ok(output) => output
                .tag_list()
                .iter()
                .map(|tag| Tag::new(tag.key(), tag.value()))
                .collect(),
            Err(e) => {
                debug!(
                    parameter = name,
                    "Could not read tags, treating as untagged: {}",
                    classify_error(&e, name)
                );
                Vec::new()
            }
        }
    }

    async fn set_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        let current = self.get_tags(name).await;
        let stale_keys: Vec<String> = current
            .iter()
            .filter(|existing| !tags.iter().any(|tag| tag.key == existing.key))
            .map(|existing| existing.key.clone())
            .collect();

        if !stale_keys.is_empty() {
            self.client
                .remove_tags_from_resource()
                .resource_type(ResourceTypeForTagging::Parameter)
                .resource_id(name)
                .set_tag_keys(Some(stale_keys))
                .send()
                .await
                .map_err(|e| classify_error(&e, name))?;
        }

        if !tags.is_empty() {
            self.client
                .add_tags_to_resource()
                .resource_type(ResourceTypeForTagging::Parameter)
                .resource_id(name)
                .set_tags(Some(to_ssm_tags(tags)?))
                .send()
                .await
                .map_err(|e| classify_error(&e, name))?;
        }

        Ok(())
    }
}
