//! Global Accelerator discovery by tag filter

use super::{TagFilter, TagWriter};
use crate::aws::globalaccelerator::AcceleratorInfo;
use crate::aws::{CloudApi, CloudError};
use crate::model::Tags;
use crate::tracking::tags_match;
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct GlobalAcceleratorTaggingManager {
    cloud: CloudApi,
}

impl GlobalAcceleratorTaggingManager {
    pub fn new(cloud: CloudApi) -> Self {
        Self { cloud }
    }

    /// Accelerators whose tags match any filter
    pub async fn list_accelerators(&self, filters: &[TagFilter]) -> Result<Vec<AcceleratorInfo>> {
        let api = self.cloud.global_accelerator("ListAccelerators");
        let accelerators = api
            .list_accelerators()
            .await
            .context("Failed to list accelerators")?;

        let mut matched = Vec::new();
        for mut accelerator in accelerators {
            accelerator.tags = self
                .cloud
                .global_accelerator("ListTagsForResource")
                .list_tags_for_resource(&accelerator.arn)
                .await
                .with_context(|| format!("Failed to list tags of {}", accelerator.arn))?;
            if filters
                .iter()
                .any(|filter| tags_match(&accelerator.tags, filter))
            {
                matched.push(accelerator);
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl TagWriter for GlobalAcceleratorTaggingManager {
    async fn current_tags(&self, arn: &str) -> Result<Tags, CloudError> {
        self.cloud
            .global_accelerator("ListTagsForResource")
            .list_tags_for_resource(arn)
            .await
    }

    async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        self.cloud
            .global_accelerator("TagResource")
            .tag_resource(arn, tags)
            .await
    }

    async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        self.cloud
            .global_accelerator("UntagResource")
            .untag_resource(arn, keys)
            .await
    }
}
