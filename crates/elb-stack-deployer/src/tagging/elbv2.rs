//! ELBv2 discovery by tag filter
//!
//! ELBv2 describe calls cannot filter by tag, so every load balancer or
//! target group in the cluster VPC is described and matched client-side.
//! With the Resource Groups Tagging API enabled, the tagged ARNs come from
//! `GetResources` instead of per-resource `DescribeTags` calls.

use super::{TagFilter, TagWriter};
use crate::aws::elbv2::{LoadBalancerInfo, TargetGroupInfo};
use crate::aws::error::ignore_not_found;
use crate::aws::resourcegroupstagging::{RESOURCE_TYPE_LOAD_BALANCER, RESOURCE_TYPE_TARGET_GROUP};
use crate::aws::{CloudApi, CloudError};
use crate::model::Tags;
use crate::tracking::tags_match;
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::defaults::ELBV2_DESCRIBE_TAGS_CHUNK_SIZE;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Elbv2TaggingManager {
    cloud: CloudApi,
    vpc_id: String,
    resource_groups_tagging: bool,
}

impl Elbv2TaggingManager {
    pub fn new(cloud: CloudApi, vpc_id: impl Into<String>) -> Self {
        Self {
            cloud,
            vpc_id: vpc_id.into(),
            resource_groups_tagging: false,
        }
    }

    pub fn with_resource_groups_tagging(mut self, enabled: bool) -> Self {
        self.resource_groups_tagging = enabled;
        self
    }

    /// Load balancers in the cluster VPC whose tags match any filter
    pub async fn list_load_balancers(&self, filters: &[TagFilter]) -> Result<Vec<LoadBalancerInfo>> {
        let load_balancers: Vec<LoadBalancerInfo> = self
            .cloud
            .elbv2("DescribeLoadBalancers")
            .describe_load_balancers()
            .await
            .context("Failed to list load balancers")?
            .into_iter()
            .filter(|lb| lb.vpc_id.as_deref() == Some(self.vpc_id.as_str()))
            .collect();

        let arns = load_balancers.iter().map(|lb| lb.arn.clone()).collect();
        let mut tags = self
            .tags_of(RESOURCE_TYPE_LOAD_BALANCER, arns, filters)
            .await?;

        Ok(load_balancers
            .into_iter()
            .filter_map(|mut lb| {
                lb.tags = tags.remove(&lb.arn)?;
                filters
                    .iter()
                    .any(|filter| tags_match(&lb.tags, filter))
                    .then_some(lb)
            })
            .collect())
    }

    /// Target groups in the cluster VPC whose tags match any filter
    pub async fn list_target_groups(&self, filters: &[TagFilter]) -> Result<Vec<TargetGroupInfo>> {
        let target_groups: Vec<TargetGroupInfo> = self
            .cloud
            .elbv2("DescribeTargetGroups")
            .describe_target_groups()
            .await
            .context("Failed to list target groups")?
            .into_iter()
            .filter(|tg| tg.vpc_id.as_deref() == Some(self.vpc_id.as_str()))
            .collect();

        let arns = target_groups.iter().map(|tg| tg.arn.clone()).collect();
        let mut tags = self
            .tags_of(RESOURCE_TYPE_TARGET_GROUP, arns, filters)
            .await?;

        Ok(target_groups
            .into_iter()
            .filter_map(|mut tg| {
                tg.tags = tags.remove(&tg.arn)?;
                filters
                    .iter()
                    .any(|filter| tags_match(&tg.tags, filter))
                    .then_some(tg)
            })
            .collect())
    }

    /// Tags keyed by ARN; resources missing from the result are skipped
    async fn tags_of(
        &self,
        resource_type: &str,
        arns: Vec<String>,
        filters: &[TagFilter],
    ) -> Result<BTreeMap<String, Tags>> {
        if !self.resource_groups_tagging {
            return self.describe_tags(arns).await;
        }
        let mut tags = BTreeMap::new();
        for filter in filters {
            tags.extend(
                self.cloud
                    .resource_groups_tagging("GetResources")
                    .get_resources(vec![resource_type.to_string()], filter.clone())
                    .await
                    .with_context(|| format!("Failed to get tagged {resource_type} resources"))?,
            );
        }
        Ok(tags)
    }

    /// Tags of many resources, fetched in API-sized chunks.
    ///
    /// A resource deleted after it was described fails its whole chunk; the
    /// chunk is then retried one ARN at a time and the deleted ones dropped.
    async fn describe_tags(&self, arns: Vec<String>) -> Result<BTreeMap<String, Tags>> {
        let elbv2 = self.cloud.elbv2("DescribeTags");
        let mut tags = BTreeMap::new();
        for chunk in arns.chunks(ELBV2_DESCRIBE_TAGS_CHUNK_SIZE) {
            match elbv2.describe_tags(chunk.to_vec()).await {
                Ok(found) => tags.extend(found),
                Err(err) if err.is_not_found() => {
                    debug!(error = %err, "Resource vanished during tag lookup, describing one by one");
                    for arn in chunk {
                        match ignore_not_found(elbv2.describe_tags(vec![arn.clone()]).await)
                            .context("Failed to describe ELBv2 tags")?
                        {
                            Some(found) => tags.extend(found),
                            None => debug!(arn = %arn, "Skipping deleted resource"),
                        }
                    }
                }
                Err(err) => return Err(err).context("Failed to describe ELBv2 tags"),
            }
        }
        Ok(tags)
    }
}

#[async_trait]
impl TagWriter for Elbv2TaggingManager {
    async fn current_tags(&self, arn: &str) -> Result<Tags, CloudError> {
        let mut tags = self
            .cloud
            .elbv2("DescribeTags")
            .describe_tags(vec![arn.to_string()])
            .await?;
        Ok(tags.remove(arn).unwrap_or_default())
    }

    async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        self.cloud.elbv2("AddTags").add_tags(arn, tags).await
    }

    async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        self.cloud.elbv2("RemoveTags").remove_tags(arn, keys).await
    }
}
