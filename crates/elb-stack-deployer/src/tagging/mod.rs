//! Tag reconciliation and tag-filtered discovery, one manager per service

mod ec2;
mod elbv2;
mod globalaccelerator;

pub use ec2::Ec2TaggingManager;
pub use elbv2::Elbv2TaggingManager;
pub use globalaccelerator::GlobalAcceleratorTaggingManager;

pub use crate::tracking::TagFilter;

use crate::aws::CloudError;
use crate::model::Tags;
use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::future::Future;
use tracing::debug;

/// Tag read/write calls of one AWS service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn current_tags(&self, resource_id: &str) -> Result<Tags, CloudError>;

    async fn add_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError>;

    async fn remove_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError>;
}

/// Options for [`reconcile_tags`]
#[derive(Debug, Clone, Default)]
pub struct ReconcileTagsOptions {
    current_tags: Option<Tags>,
    ignored_tag_keys: Vec<String>,
}

impl ReconcileTagsOptions {
    /// Use already-known tags instead of fetching them
    pub fn with_current_tags(mut self, tags: Tags) -> Self {
        self.current_tags = Some(tags);
        self
    }

    /// Keys that are never added or removed
    pub fn with_ignored_tag_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.ignored_tag_keys.extend(keys);
        self
    }
}

/// Changes needed to turn the current tags into the desired ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub add: Tags,
    pub remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub fn diff_tags(desired: &Tags, current: &Tags, ignored: &[String]) -> TagDiff {
    let add = desired
        .iter()
        .filter(|&(key, value)| !ignored.contains(key) && current.get(key) != Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let remove = current
        .keys()
        .filter(|&key| !ignored.contains(key) && !desired.contains_key(key))
        .cloned()
        .collect();
    TagDiff { add, remove }
}

/// Converge the tags of one resource.
///
/// Issues at most one add call and one remove call, skipping either when
/// there is nothing to send.
pub async fn reconcile_tags(
    writer: &dyn TagWriter,
    resource_id: &str,
    desired: &Tags,
    options: ReconcileTagsOptions,
) -> Result<()> {
    let current = match options.current_tags {
        Some(tags) => tags,
        None => writer
            .current_tags(resource_id)
            .await
            .with_context(|| format!("Failed to read tags of {resource_id}"))?,
    };

    let diff = diff_tags(desired, &current, &options.ignored_tag_keys);
    if diff.is_empty() {
        debug!(resource_id = %resource_id, "Tags already up to date");
        return Ok(());
    }

    if !diff.add.is_empty() {
        debug!(resource_id = %resource_id, count = diff.add.len(), "Adding tags");
        writer
            .add_tags(resource_id, diff.add)
            .await
            .with_context(|| format!("Failed to tag {resource_id}"))?;
    }
    if !diff.remove.is_empty() {
        debug!(resource_id = %resource_id, keys = ?diff.remove, "Removing tags");
        writer
            .remove_tags(resource_id, diff.remove)
            .await
            .with_context(|| format!("Failed to untag {resource_id}"))?;
    }
    Ok(())
}

/// Run `list` once per filter and union the results by identity.
///
/// A later filter's copy of a resource replaces an earlier one.
pub(crate) async fn union_by_filter<T, F, Fut>(
    filters: &[TagFilter],
    mut list: F,
    identity: fn(&T) -> &str,
) -> Result<Vec<T>>
where
    F: FnMut(&TagFilter) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut found: IndexMap<String, T> = IndexMap::new();
    for filter in filters {
        for item in list(filter).await? {
            found.insert(identity(&item).to_string(), item);
        }
    }
    Ok(found.into_values().collect())
}
