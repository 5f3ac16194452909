//! Ownership tags for stack resources
//!
//! Nothing but AWS tags records which AWS resources belong to which stack.
//! The [`TrackingProvider`] computes the tags applied on create and the tag
//! filters used to find a stack's resources again on the next pass.

use crate::config::DeployerConfig;
use crate::model::{Resource, StackId, Tags};
use elb_stack_common::tags::{
    LEGACY_INGRESS_NAME_TAG, LEGACY_NAMESPACE_TAG, LEGACY_SERVICE_NAME_TAG, TAG_SUFFIX_CLUSTER,
    TAG_SUFFIX_RESOURCE, TAG_SUFFIX_STACK, legacy_cluster_tag_key, tag_key,
};
use std::collections::BTreeMap;

/// Tag key to accepted values; an empty list only requires the key
pub type TagFilter = BTreeMap<String, Vec<String>>;

/// Whether `tags` satisfies every entry of `filter`
pub fn tags_match(tags: &Tags, filter: &TagFilter) -> bool {
    filter.iter().all(|(key, values)| match tags.get(key) {
        Some(value) => values.is_empty() || values.contains(value),
        None => false,
    })
}

/// Computes ownership tags and discovery filters for one cluster
#[derive(Debug, Clone)]
pub struct TrackingProvider {
    cluster_name: String,
    tag_prefix: String,
    legacy_tag_prefix: String,
    default_tags: Tags,
    external_managed_tags: Vec<String>,
}

impl TrackingProvider {
    pub fn new(config: &DeployerConfig) -> Self {
        Self {
            cluster_name: config.cluster_name.clone(),
            tag_prefix: config.tag_prefix.clone(),
            legacy_tag_prefix: config.legacy_tag_prefix.clone(),
            default_tags: config.default_tags.clone(),
            external_managed_tags: config.external_managed_tags.clone(),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn cluster_tag_key(&self) -> String {
        tag_key(&self.tag_prefix, TAG_SUFFIX_CLUSTER)
    }

    pub fn stack_tag_key(&self) -> String {
        tag_key(&self.tag_prefix, TAG_SUFFIX_STACK)
    }

    /// Key whose value is the resource's ID inside its stack
    pub fn resource_id_tag_key(&self) -> String {
        tag_key(&self.tag_prefix, TAG_SUFFIX_RESOURCE)
    }

    pub fn legacy_resource_id_tag_key(&self) -> String {
        tag_key(&self.legacy_tag_prefix, TAG_SUFFIX_RESOURCE)
    }

    /// Tags identifying the owning cluster and stack
    pub fn stack_tags(&self, stack_id: &StackId) -> Tags {
        Tags::from([
            (self.cluster_tag_key(), self.cluster_name.clone()),
            (self.stack_tag_key(), stack_id.to_string()),
        ])
    }

    /// Full tag set for a resource.
    ///
    /// Later sources win on key collisions: stack tags, then configured
    /// default tags, then the resource's own tags. The resource-ID tag is
    /// applied last and cannot be overridden.
    pub fn resource_tags(&self, resource: &dyn Resource, custom: &Tags) -> Tags {
        let mut tags = self.stack_tags(resource.stack_id());
        tags.extend(
            self.default_tags
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        tags.extend(custom.iter().map(|(key, value)| (key.clone(), value.clone())));
        tags.insert(self.resource_id_tag_key(), resource.id().to_string());
        tags
    }

    /// Filter matching resources of a stack under the current prefix
    pub fn stack_tag_filter(&self, stack_id: &StackId) -> TagFilter {
        TagFilter::from([
            (self.cluster_tag_key(), vec![self.cluster_name.clone()]),
            (self.stack_tag_key(), vec![stack_id.to_string()]),
        ])
    }

    /// Filter matching resources of a stack under the legacy prefix
    pub fn legacy_stack_tag_filter(&self, stack_id: &StackId) -> TagFilter {
        TagFilter::from([
            (
                tag_key(&self.legacy_tag_prefix, TAG_SUFFIX_CLUSTER),
                vec![self.cluster_name.clone()],
            ),
            (
                tag_key(&self.legacy_tag_prefix, TAG_SUFFIX_STACK),
                vec![stack_id.to_string()],
            ),
        ])
    }

    /// Both discovery filters; results are unioned
    pub fn stack_tag_filters(&self, stack_id: &StackId) -> Vec<TagFilter> {
        vec![
            self.stack_tag_filter(stack_id),
            self.legacy_stack_tag_filter(stack_id),
        ]
    }

    /// Resource ID recorded in `tags`, preferring the current prefix
    pub fn resource_id_of<'a>(&self, tags: &'a Tags) -> Option<&'a str> {
        tags.get(&self.resource_id_tag_key())
            .or_else(|| tags.get(&self.legacy_resource_id_tag_key()))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Owner recorded in `tags` under either prefix, when that owner is
    /// another cluster or another stack than `stack_id`
    pub fn foreign_owner(&self, tags: &Tags, stack_id: &StackId) -> Option<String> {
        let stack = stack_id.to_string();
        for prefix in [&self.tag_prefix, &self.legacy_tag_prefix] {
            let cluster = tags.get(&tag_key(prefix, TAG_SUFFIX_CLUSTER));
            if let Some(cluster) = cluster.filter(|name| **name != self.cluster_name) {
                return Some(format!("cluster {cluster}"));
            }
            let owner = tags.get(&tag_key(prefix, TAG_SUFFIX_STACK));
            if let Some(owner) = owner.filter(|owner| **owner != stack) {
                return Some(format!("stack {owner}"));
            }
        }
        None
    }

    /// Keys written by the predecessor naming scheme
    pub fn legacy_tag_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = [TAG_SUFFIX_CLUSTER, TAG_SUFFIX_STACK, TAG_SUFFIX_RESOURCE]
            .iter()
            .map(|suffix| tag_key(&self.legacy_tag_prefix, suffix))
            .collect();
        keys.extend([
            legacy_cluster_tag_key(&self.cluster_name),
            LEGACY_NAMESPACE_TAG.to_string(),
            LEGACY_INGRESS_NAME_TAG.to_string(),
            LEGACY_SERVICE_NAME_TAG.to_string(),
        ]);
        keys
    }

    /// Keys tag reconciliation must neither add nor remove
    pub fn ignored_tag_keys(&self) -> Vec<String> {
        let mut keys = self.legacy_tag_keys();
        keys.extend(self.external_managed_tags.iter().cloned());
        keys
    }
}
