//! EC2 discovery by tag filter

use super::{TagFilter, TagWriter, union_by_filter};
use crate::aws::{CloudApi, CloudError};
use crate::aws::ec2::{AddressInfo, Ec2Filter, EndpointServiceInfo, SecurityGroupInfo};
use crate::model::Tags;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Convert a tag filter into EC2 describe filters.
///
/// A key with values becomes `tag:<key>`; a key without values becomes
/// `tag-key`, matching any value.
pub fn ec2_tag_filters(filter: &TagFilter) -> Vec<Ec2Filter> {
    filter
        .iter()
        .map(|(key, values)| {
            if values.is_empty() {
                Ec2Filter::new("tag-key", vec![key.clone()])
            } else {
                Ec2Filter::new(format!("tag:{key}"), values.clone())
            }
        })
        .collect()
}

fn group_id(info: &SecurityGroupInfo) -> &str {
    &info.group_id
}

fn allocation_id(info: &AddressInfo) -> &str {
    &info.allocation_id
}

fn service_id(info: &EndpointServiceInfo) -> &str {
    &info.service_id
}

/// Lists and tags EC2 resources
#[derive(Debug, Clone)]
pub struct Ec2TaggingManager {
    cloud: CloudApi,
    vpc_id: String,
}

impl Ec2TaggingManager {
    pub fn new(cloud: CloudApi, vpc_id: impl Into<String>) -> Self {
        Self {
            cloud,
            vpc_id: vpc_id.into(),
        }
    }

    /// Security groups in the cluster VPC matching any filter
    pub async fn list_security_groups(
        &self,
        filters: &[TagFilter],
    ) -> Result<Vec<SecurityGroupInfo>> {
        union_by_filter(
            filters,
            |filter| {
                let mut ec2_filters = ec2_tag_filters(filter);
                ec2_filters.push(Ec2Filter::new("vpc-id", vec![self.vpc_id.clone()]));
                async move {
                    self.cloud
                        .ec2("DescribeSecurityGroups")
                        .describe_security_groups(ec2_filters)
                        .await
                        .context("Failed to list security groups")
                }
            },
            group_id,
        )
        .await
    }

    /// Elastic IPs matching any filter
    pub async fn list_addresses(&self, filters: &[TagFilter]) -> Result<Vec<AddressInfo>> {
        union_by_filter(
            filters,
            |filter| {
                let ec2_filters = ec2_tag_filters(filter);
                async move {
                    self.cloud
                        .ec2("DescribeAddresses")
                        .describe_addresses(ec2_filters)
                        .await
                        .context("Failed to list Elastic IPs")
                }
            },
            allocation_id,
        )
        .await
    }

    /// VPC endpoint services matching any filter
    pub async fn list_endpoint_services(
        &self,
        filters: &[TagFilter],
    ) -> Result<Vec<EndpointServiceInfo>> {
        union_by_filter(
            filters,
            |filter| {
                let ec2_filters = ec2_tag_filters(filter);
                async move {
                    self.cloud
                        .ec2("DescribeVpcEndpointServiceConfigurations")
                        .describe_endpoint_services(ec2_filters)
                        .await
                        .context("Failed to list VPC endpoint services")
                }
            },
            service_id,
        )
        .await
    }
}

#[async_trait]
impl TagWriter for Ec2TaggingManager {
    async fn current_tags(&self, resource_id: &str) -> Result<Tags, CloudError> {
        self.cloud.ec2("DescribeTags").describe_tags(resource_id).await
    }

    async fn add_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError> {
        self.cloud.ec2("CreateTags").create_tags(resource_id, tags).await
    }

    async fn remove_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError> {
        self.cloud.ec2("DeleteTags").delete_tags(resource_id, keys).await
    }
}
