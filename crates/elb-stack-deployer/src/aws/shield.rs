//! Shield Advanced capability

use crate::aws::context::AwsContext;
use crate::aws::error::{CloudError, ignore_not_found};
use async_trait::async_trait;
use aws_sdk_shield::Client;
use aws_sdk_shield::types::SubscriptionState;

/// Observed protection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionInfo {
    pub id: String,
    pub name: String,
    pub resource_arn: String,
}

/// Shield operations used by the protection manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShieldApi: Send + Sync {
    /// Whether the account holds an active Shield Advanced subscription
    async fn subscription_active(&self) -> Result<bool, CloudError>;

    /// Protection covering `resource_arn`, if any
    async fn describe_protection(
        &self,
        resource_arn: &str,
    ) -> Result<Option<ProtectionInfo>, CloudError>;

    /// Create a protection, returning its ID
    async fn create_protection(&self, name: &str, resource_arn: &str)
    -> Result<String, CloudError>;

    async fn delete_protection(&self, protection_id: &str) -> Result<(), CloudError>;
}

/// SDK-backed Shield client, pinned to us-east-1
pub struct ShieldClient {
    client: Client,
}

impl ShieldClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.shield_client(),
        }
    }
}

#[async_trait]
impl ShieldApi for ShieldClient {
    async fn subscription_active(&self) -> Result<bool, CloudError> {
        let response = self
            .client
            .get_subscription_state()
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("GetSubscriptionState", e))?;
        Ok(*response.subscription_state() == SubscriptionState::Active)
    }

    async fn describe_protection(
        &self,
        resource_arn: &str,
    ) -> Result<Option<ProtectionInfo>, CloudError> {
        let result = self
            .client
            .describe_protection()
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeProtection", e));

        Ok(ignore_not_found(result)?.and_then(|response| {
            let protection = response.protection()?;
            Some(ProtectionInfo {
                id: protection.id()?.to_string(),
                name: protection.name().unwrap_or_default().to_string(),
                resource_arn: protection
                    .resource_arn()
                    .unwrap_or(resource_arn)
                    .to_string(),
            })
        }))
    }

    async fn create_protection(
        &self,
        name: &str,
        resource_arn: &str,
    ) -> Result<String, CloudError> {
        let response = self
            .client
            .create_protection()
            .name(name)
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("CreateProtection", e))?;
        response
            .protection_id()
            .map(str::to_string)
            .ok_or_else(|| CloudError::missing_field("CreateProtection", "ProtectionId"))
    }

    async fn delete_protection(&self, protection_id: &str) -> Result<(), CloudError> {
        self.client
            .delete_protection()
            .protection_id(protection_id)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteProtection", e))?;
        Ok(())
    }
}
