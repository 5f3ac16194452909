//! WAFv2 capability

use crate::aws::context::AwsContext;
use crate::aws::error::{CloudError, ignore_not_found};
use async_trait::async_trait;
use aws_sdk_wafv2::Client;

/// WAFv2 operations used by the web ACL association manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wafv2Api: Send + Sync {
    /// ARN of the web ACL attached to `resource_arn`, if any
    async fn get_web_acl_for_resource(
        &self,
        resource_arn: &str,
    ) -> Result<Option<String>, CloudError>;

    async fn associate_web_acl(
        &self,
        web_acl_arn: &str,
        resource_arn: &str,
    ) -> Result<(), CloudError>;

    async fn disassociate_web_acl(&self, resource_arn: &str) -> Result<(), CloudError>;
}

/// SDK-backed WAFv2 client
pub struct Wafv2Client {
    client: Client,
}

impl Wafv2Client {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.wafv2_client(),
        }
    }
}

#[async_trait]
impl Wafv2Api for Wafv2Client {
    async fn get_web_acl_for_resource(
        &self,
        resource_arn: &str,
    ) -> Result<Option<String>, CloudError> {
        let result = self
            .client
            .get_web_acl_for_resource()
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("GetWebACLForResource", e));

        Ok(ignore_not_found(result)?
            .and_then(|response| response.web_acl().map(|acl| acl.arn().to_string())))
    }

    async fn associate_web_acl(
        &self,
        web_acl_arn: &str,
        resource_arn: &str,
    ) -> Result<(), CloudError> {
        self.client
            .associate_web_acl()
            .web_acl_arn(web_acl_arn)
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("AssociateWebACL", e))?;
        Ok(())
    }

    async fn disassociate_web_acl(&self, resource_arn: &str) -> Result<(), CloudError> {
        self.client
            .disassociate_web_acl()
            .resource_arn(resource_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DisassociateWebACL", e))?;
        Ok(())
    }
}
