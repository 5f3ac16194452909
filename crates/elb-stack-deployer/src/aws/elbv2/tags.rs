//! ELBv2 tag plumbing

use super::Elbv2Client;
use crate::aws::error::CloudError;
use crate::model::Tags;
use aws_sdk_elasticloadbalancingv2::types::Tag;
use std::collections::BTreeMap;

/// Convert a tag map into SDK tags; ELBv2 tags require a key
pub(super) fn tags_to_sdk(operation: &str, tags: &Tags) -> Result<Vec<Tag>, CloudError> {
    tags.iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| CloudError::new(operation, None, e.to_string()))
        })
        .collect()
}

/// `None` for an empty tag map, since create calls reject empty tag lists
pub(super) fn optional_tags(operation: &str, tags: &Tags) -> Result<Option<Vec<Tag>>, CloudError> {
    if tags.is_empty() {
        return Ok(None);
    }
    tags_to_sdk(operation, tags).map(Some)
}

impl Elbv2Client {
    pub async fn describe_tags(
        &self,
        arns: Vec<String>,
    ) -> Result<BTreeMap<String, Tags>, CloudError> {
        let response = self
            .client
            .describe_tags()
            .set_resource_arns(Some(arns))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeTags", e))?;

        Ok(response
            .tag_descriptions()
            .iter()
            .filter_map(|description| {
                let arn = description.resource_arn()?.to_string();
                let tags = description
                    .tags()
                    .iter()
                    .map(|tag| {
                        (
                            tag.key().to_string(),
                            tag.value().unwrap_or_default().to_string(),
                        )
                    })
                    .collect();
                Some((arn, tags))
            })
            .collect())
    }

    pub async fn add_tags(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        self.client
            .add_tags()
            .resource_arns(arn)
            .set_tags(Some(tags_to_sdk("AddTags", &tags)?))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("AddTags", e))?;
        Ok(())
    }

    pub async fn remove_tags(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        self.client
            .remove_tags()
            .resource_arns(arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("RemoveTags", e))?;
        Ok(())
    }
}
