//! AWS RDS snapshot store.
//!
//! Uses the AWS SDK for Rust with the standard credential chain (environment,
//! instance profile, etc.). One client is built per region from a shared
//! `SdkConfig`.

use async_trait::async_trait;
use aws_sdk_rds::{
    Client,
    config::Region,
    types::{DbInstance, DbSnapshot},
};
use dashmap::DashMap;

use super::{
    CreationRequest, ResourceRef, SnapshotCatalog, SnapshotRecord, SnapshotStatus, SnapshotStore,
    StoreError, StoreResult, Tag, require_region,
};

/// Configuration for the RDS store.
#[derive(Debug, Clone, Default)]
pub struct RdsStoreConfig {
    /// Optional endpoint URL for testing with localstack
    pub endpoint_url: Option<String>,
}

impl RdsStoreConfig {
    /// Use the default AWS endpoints.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set a custom endpoint URL (useful for localstack testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

impl From<&crate::config::RdsConfig> for RdsStoreConfig {
    fn from(config: &crate::config::RdsConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
        }
    }
}

/// Snapshot store backed by AWS RDS.
pub struct RdsSnapshotStore {
    sdk_config: aws_config::SdkConfig,
    endpoint_url: Option<String>,
    clients: DashMap<String, Client>,
}

impl RdsSnapshotStore {
    /// Load shared AWS configuration from the environment.
    pub async fn new(config: RdsStoreConfig) -> Self {
        let sdk_config = aws_config::from_env().load().await;

        Self {
            sdk_config,
            endpoint_url: config.endpoint_url,
            clients: DashMap::new(),
        }
    }

    fn client(&self, region: &str) -> Client {
        if let Some(client) = self.clients.get(region) {
            return client.clone();
        }

        let mut rds_config = aws_sdk_rds::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()));

        if let Some(endpoint_url) = &self.endpoint_url {
            rds_config = rds_config.endpoint_url(endpoint_url);
        }

        let client = Client::from_conf(rds_config.build());
        self.clients.insert(region.to_string(), client.clone());
        client
    }
}

fn api_error(operation: &'static str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Api {
        operation,
        message: err.to_string(),
    }
}

fn to_utc(t: &aws_smithy_types::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

/// An instance eligible for backup: it must be "available" and carry both an
/// identifier and an ARN.
fn available_resource(instance: &DbInstance) -> Option<ResourceRef> {
    if instance.db_instance_status() != Some("available") {
        return None;
    }
    Some(ResourceRef::new(
        instance.db_instance_identifier()?,
        instance.db_instance_arn()?,
    ))
}

/// Owning instance and record for a described snapshot.
fn snapshot_record(snapshot: &DbSnapshot) -> Option<(String, SnapshotRecord)> {
    let resource = snapshot.db_instance_identifier()?.to_string();
    let record = SnapshotRecord {
        id: snapshot.db_snapshot_identifier()?.to_string(),
        created_at: snapshot.snapshot_create_time().and_then(to_utc),
        status: SnapshotStatus::from(snapshot.status().unwrap_or_default()),
        snapshot_type: snapshot.snapshot_type().map(str::to_string),
        arn: snapshot.db_snapshot_arn().map(str::to_string),
    };
    Some((resource, record))
}

fn from_sdk_tag(tag: &aws_sdk_rds::types::Tag) -> Option<Tag> {
    Some(Tag::new(tag.key()?, tag.value().unwrap_or_default()))
}

fn to_sdk_tag(tag: &Tag) -> aws_sdk_rds::types::Tag {
    aws_sdk_rds::types::Tag::builder()
        .key(&tag.key)
        .value(&tag.value)
        .build()
}

#[async_trait]
impl SnapshotStore for RdsSnapshotStore {
    async fn available_resources(&self, region: &str) -> StoreResult<Vec<ResourceRef>> {
        require_region(region, "available_resources")?;

        let mut resources = Vec::new();
        let mut instances = self
            .client(region)
            .describe_db_instances()
            .into_paginator()
            .items()
            .send();

        while let Some(instance) = instances.next().await {
            let instance =
                instance.map_err(|e| api_error("DescribeDBInstances", e.into_service_error()))?;
            match available_resource(&instance) {
                Some(resource) => resources.push(resource),
                None => tracing::debug!(
                    region,
                    instance = ?instance.db_instance_identifier(),
                    status = ?instance.db_instance_status(),
                    "Skipping instance that is not available for backup"
                ),
            }
        }

        Ok(resources)
    }

    async fn snapshot_catalog(&self, region: &str) -> StoreResult<SnapshotCatalog> {
        require_region(region, "snapshot_catalog")?;

        let mut records = Vec::new();
        let mut snapshots = self
            .client(region)
            .describe_db_snapshots()
            .into_paginator()
            .items()
            .send();

        while let Some(snapshot) = snapshots.next().await {
            let snapshot =
                snapshot.map_err(|e| api_error("DescribeDBSnapshots", e.into_service_error()))?;
            if let Some(entry) = snapshot_record(&snapshot) {
                records.push(entry);
            }
        }

        Ok(SnapshotCatalog::from_records(records))
    }

    async fn resource_tags(&self, region: &str, resource: &ResourceRef) -> StoreResult<Vec<Tag>> {
        require_region(region, "resource_tags")?;

        let output = self
            .client(region)
            .list_tags_for_resource()
            .resource_name(&resource.arn)
            .send()
            .await
            .map_err(|e| api_error("ListTagsForResource", e.into_service_error()))?;

        Ok(output.tag_list().iter().filter_map(from_sdk_tag).collect())
    }

    async fn create_snapshot(&self, region: &str, request: &CreationRequest) -> StoreResult<()> {
        require_region(region, "create_snapshot")?;

        self.client(region)
            .create_db_snapshot()
            .db_instance_identifier(&request.resource_name)
            .db_snapshot_identifier(&request.snapshot_id)
            .set_tags(Some(request.tags.iter().map(to_sdk_tag).collect()))
            .send()
            .await
            .map_err(|e| api_error("CreateDBSnapshot", e.into_service_error()))?;

        Ok(())
    }

    async fn delete_snapshot(
        &self,
        region: &str,
        resource: &str,
        snapshot_id: &str,
    ) -> StoreResult<()> {
        require_region(region, "delete_snapshot")?;

        self.client(region)
            .delete_db_snapshot()
            .db_snapshot_identifier(snapshot_id)
            .send()
            .await
            .map_err(|e| api_error("DeleteDBSnapshot", e.into_service_error()))?;

        tracing::debug!(region, resource, snapshot_id, "Deleted snapshot");
        Ok(())
    }
}
