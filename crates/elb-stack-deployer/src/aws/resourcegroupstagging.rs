//! Resource Groups Tagging capability: tag-filtered resource discovery

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use crate::model::Tags;
use crate::tracking::TagFilter;
use async_trait::async_trait;
use aws_sdk_resourcegroupstagging::Client;
use aws_sdk_resourcegroupstagging::types::TagFilter as SdkTagFilter;
use std::collections::BTreeMap;

/// Resource type filter for ELBv2 load balancers
pub const RESOURCE_TYPE_LOAD_BALANCER: &str = "elasticloadbalancing:loadbalancer";

/// Resource type filter for ELBv2 target groups
pub const RESOURCE_TYPE_TARGET_GROUP: &str = "elasticloadbalancing:targetgroup";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceGroupsTaggingApi: Send + Sync {
    /// ARNs and tags of the resources of `resource_types` matching every
    /// entry of `filter`
    async fn get_resources(
        &self,
        resource_types: Vec<String>,
        filter: TagFilter,
    ) -> Result<BTreeMap<String, Tags>, CloudError>;
}

/// SDK-backed Resource Groups Tagging client
pub struct ResourceGroupsTaggingClient {
    client: Client,
}

impl ResourceGroupsTaggingClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.resource_groups_tagging_client(),
        }
    }
}

#[async_trait]
impl ResourceGroupsTaggingApi for ResourceGroupsTaggingClient {
    async fn get_resources(
        &self,
        resource_types: Vec<String>,
        filter: TagFilter,
    ) -> Result<BTreeMap<String, Tags>, CloudError> {
        let tag_filters: Vec<SdkTagFilter> = filter
            .into_iter()
            .map(|(key, values)| {
                SdkTagFilter::builder()
                    .key(key)
                    .set_values((!values.is_empty()).then_some(values))
                    .build()
            })
            .collect();

        let mut resources = BTreeMap::new();
        let mut pagination_token: Option<String> = None;
        loop {
            let response = self
                .client
                .get_resources()
                .set_resource_type_filters(Some(resource_types.clone()))
                .set_tag_filters(Some(tag_filters.clone()))
                .set_pagination_token(pagination_token.take())
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("GetResources", e))?;

            for mapping in response.resource_tag_mapping_list() {
                let Some(arn) = mapping.resource_arn() else {
                    continue;
                };
                let tags = mapping
                    .tags()
                    .iter()
                    .map(|tag| (tag.key().to_string(), tag.value().to_string()))
                    .collect();
                resources.insert(arn.to_string(), tags);
            }

            match response.pagination_token() {
                Some(token) if !token.is_empty() => pagination_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(resources)
    }
}
