//! EC2 tag plumbing

use super::{Ec2Client, Ec2Filter};
use crate::aws::error::CloudError;
use crate::model::Tags;
use aws_sdk_ec2::types::{Filter, ResourceType, Tag, TagSpecification};

/// Convert SDK tags into a map, skipping tags without a key
pub(super) fn tags_from_sdk(tags: &[Tag]) -> Tags {
    tags.iter()
        .filter_map(|tag| {
            let key = tag.key()?;
            Some((key.to_string(), tag.value().unwrap_or_default().to_string()))
        })
        .collect()
}

pub(super) fn tags_to_sdk(tags: &Tags) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

/// Tag specification applied at creation time
pub(super) fn tag_specification(resource_type: ResourceType, tags: &Tags) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .set_tags(Some(tags_to_sdk(tags)))
        .build()
}

pub(super) fn filters_to_sdk(filters: Vec<Ec2Filter>) -> Option<Vec<Filter>> {
    if filters.is_empty() {
        return None;
    }
    Some(
        filters
            .into_iter()
            .map(|filter| {
                Filter::builder()
                    .name(filter.name)
                    .set_values(Some(filter.values))
                    .build()
            })
            .collect(),
    )
}

impl Ec2Client {
    /// Current tags of one resource
    pub async fn describe_tags(&self, resource_id: &str) -> Result<Tags, CloudError> {
        let mut tags = Tags::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_tags()
                .filters(
                    Filter::builder()
                        .name("resource-id")
                        .values(resource_id)
                        .build(),
                )
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeTags", e))?;

            for description in response.tags() {
                if let Some(key) = description.key() {
                    tags.insert(
                        key.to_string(),
                        description.value().unwrap_or_default().to_string(),
                    );
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(tags)
    }

    pub async fn create_tags(&self, resource_id: &str, tags: Tags) -> Result<(), CloudError> {
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(tags_to_sdk(&tags)))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("CreateTags", e))?;
        Ok(())
    }

    pub async fn delete_tags(&self, resource_id: &str, keys: Vec<String>) -> Result<(), CloudError> {
        let tags = keys
            .into_iter()
            .map(|key| Tag::builder().key(key).build())
            .collect();
        self.client
            .delete_tags()
            .resources(resource_id)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteTags", e))?;
        Ok(())
    }
}
