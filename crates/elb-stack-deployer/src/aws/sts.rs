//! STS capability: caller identity

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use async_trait::async_trait;
use aws_sdk_sts::Client;

/// Identity the AWS credentials resolve to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StsApi: Send + Sync {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, CloudError>;
}

/// SDK-backed STS client
pub struct StsClient {
    client: Client,
}

impl StsClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.sts_client(),
        }
    }
}

#[async_trait]
impl StsApi for StsClient {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, CloudError> {
        const OPERATION: &str = "GetCallerIdentity";
        let response = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;
        Ok(CallerIdentity {
            account: response
                .account()
                .ok_or_else(|| CloudError::missing_field(OPERATION, "Account"))?
                .to_string(),
            arn: response
                .arn()
                .ok_or_else(|| CloudError::missing_field(OPERATION, "Arn"))?
                .to_string(),
        })
    }
}
