//! Global Accelerator capability

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use crate::model::Tags;
use async_trait::async_trait;
use aws_sdk_globalaccelerator::Client;
use aws_sdk_globalaccelerator::types::{Accelerator, IpAddressType, Tag};

/// Observed accelerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorInfo {
    pub arn: String,
    pub name: String,
    pub ip_address_type: String,
    pub ip_addresses: Vec<String>,
    pub enabled: bool,
    /// `DEPLOYED` or `IN_PROGRESS`
    pub status: String,
    pub dns_name: String,
    /// Filled in by the tagging manager
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAcceleratorInput {
    pub name: String,
    pub ip_address_type: String,
    pub ip_addresses: Vec<String>,
    pub enabled: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAcceleratorInput {
    pub accelerator_arn: String,
    pub name: String,
    pub ip_address_type: String,
    pub enabled: bool,
}

/// Global Accelerator operations used by the accelerator manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GlobalAcceleratorApi: Send + Sync {
    /// Every accelerator in the account, without tags
    async fn list_accelerators(&self) -> Result<Vec<AcceleratorInfo>, CloudError>;

    async fn describe_accelerator(&self, arn: &str) -> Result<AcceleratorInfo, CloudError>;

    async fn create_accelerator(
        &self,
        input: CreateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError>;

    async fn update_accelerator(
        &self,
        input: UpdateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError>;

    async fn delete_accelerator(&self, arn: &str) -> Result<(), CloudError>;

    /// Listener ARNs of an accelerator
    async fn list_listeners(&self, accelerator_arn: &str) -> Result<Vec<String>, CloudError>;

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError>;

    /// Endpoint group ARNs of a listener
    async fn list_endpoint_groups(&self, listener_arn: &str) -> Result<Vec<String>, CloudError>;

    async fn delete_endpoint_group(&self, endpoint_group_arn: &str) -> Result<(), CloudError>;

    async fn list_tags_for_resource(&self, arn: &str) -> Result<Tags, CloudError>;

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<(), CloudError>;

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError>;
}

fn accelerator_from_sdk(accelerator: &Accelerator) -> Option<AcceleratorInfo> {
    Some(AcceleratorInfo {
        arn: accelerator.accelerator_arn()?.to_string(),
        name: accelerator.name().unwrap_or_default().to_string(),
        ip_address_type: accelerator
            .ip_address_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        ip_addresses: accelerator
            .ip_sets()
            .iter()
            .flat_map(|set| set.ip_addresses().iter().cloned())
            .collect(),
        enabled: accelerator.enabled().unwrap_or(false),
        status: accelerator
            .status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        dns_name: accelerator.dns_name().unwrap_or_default().to_string(),
        tags: Tags::new(),
    })
}

fn tags_to_sdk(operation: &str, tags: &Tags) -> Result<Vec<Tag>, CloudError> {
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

/// SDK-backed Global Accelerator client, pinned to us-west-2
pub struct GlobalAcceleratorClient {
    client: Client,
}

impl GlobalAcceleratorClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.global_accelerator_client(),
        }
    }
}

#[async_trait]
impl GlobalAcceleratorApi for GlobalAcceleratorClient {
    async fn list_accelerators(&self) -> Result<Vec<AcceleratorInfo>, CloudError> {
        let mut accelerators = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_accelerators()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("ListAccelerators", e))?;

            accelerators.extend(response.accelerators().iter().filter_map(accelerator_from_sdk));

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(accelerators)
    }

    async fn describe_accelerator(&self, arn: &str) -> Result<AcceleratorInfo, CloudError> {
        const OPERATION: &str = "DescribeAccelerator";
        let response = self
            .client
            .describe_accelerator()
            .accelerator_arn(arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;
        response
            .accelerator()
            .and_then(accelerator_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "Accelerator"))
    }

    async fn create_accelerator(
        &self,
        input: CreateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError> {
        const OPERATION: &str = "CreateAccelerator";
        let tags = tags_to_sdk(OPERATION, &input.tags)?;
        let response = self
            .client
            .create_accelerator()
            .name(&input.name)
            .ip_address_type(IpAddressType::from(input.ip_address_type.as_str()))
            .set_ip_addresses((!input.ip_addresses.is_empty()).then(|| input.ip_addresses.clone()))
            .enabled(input.enabled)
            .idempotency_token(uuid::Uuid::new_v4().to_string())
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        let mut info = response
            .accelerator()
            .and_then(accelerator_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "Accelerator"))?;
        info.tags = input.tags;
        Ok(info)
    }

    async fn update_accelerator(
        &self,
        input: UpdateAcceleratorInput,
    ) -> Result<AcceleratorInfo, CloudError> {
        const OPERATION: &str = "UpdateAccelerator";
        let response = self
            .client
            .update_accelerator()
            .accelerator_arn(&input.accelerator_arn)
            .name(&input.name)
            .ip_address_type(IpAddressType::from(input.ip_address_type.as_str()))
            .enabled(input.enabled)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;
        response
            .accelerator()
            .and_then(accelerator_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "Accelerator"))
    }

    async fn delete_accelerator(&self, arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_accelerator()
            .accelerator_arn(arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteAccelerator", e))?;
        Ok(())
    }

    async fn list_listeners(&self, accelerator_arn: &str) -> Result<Vec<String>, CloudError> {
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_listeners()
                .accelerator_arn(accelerator_arn)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("ListListeners", e))?;

            arns.extend(
                response
                    .listeners()
                    .iter()
                    .filter_map(|listener| listener.listener_arn().map(str::to_string)),
            );

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_listener()
            .listener_arn(listener_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteListener", e))?;
        Ok(())
    }

    async fn list_endpoint_groups(&self, listener_arn: &str) -> Result<Vec<String>, CloudError> {
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_endpoint_groups()
                .listener_arn(listener_arn)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("ListEndpointGroups", e))?;

            arns.extend(
                response
                    .endpoint_groups()
                    .iter()
                    .filter_map(|group| group.endpoint_group_arn().map(str::to_string)),
            );

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn delete_endpoint_group(&self, endpoint_group_arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_endpoint_group()
            .endpoint_group_arn(endpoint_group_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteEndpointGroup", e))?;
        Ok(())
    }

    async fn list_tags_for_resource(&self, arn: &str) -> Result<Tags, CloudError> {
        let response = self
            .client
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ListTagsForResource", e))?;
        Ok(response
            .tags()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<(), CloudError> {
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags_to_sdk("TagResource", &tags)?))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("TagResource", e))?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), CloudError> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("UntagResource", e))?;
        Ok(())
    }
}
