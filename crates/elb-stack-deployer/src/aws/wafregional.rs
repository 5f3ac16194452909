//! WAF Classic (regional) capability
//!
//! Classic web ACLs are addressed by ID rather than ARN.

use crate::aws::context::AwsContext;
use crate::aws::error::{CloudError, ignore_not_found};
use async_trait::async_trait;
use aws_sdk_wafregional::Client;

/// WAF Regional web ACL association operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WafRegionalApi: Send + Sync {
    /// ID of the web ACL attached to `resource_arn`, if any
    async fn get_web_acl_for_resource(
        &self,
        resource_arn: &str,
    ) -> Result<Option<String>, CloudError>;

    async fn associate_web_acl(
        &self,
        web_acl_id: &str,
        resource_arn: &str,
    ) -> Result<(), CloudError>;

    async fn disassociate_web_acl(&self, resource_arn: &str) -> Result<(), CloudError>;
}

/// SDK-backed WAF Regional client
pub struct WafRegionalClient {
    client: Client,
}

impl WafRegionalClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.waf_regional_client(),
        }
    }
}

#[async_trait]
impl WafRegionalApi for WafRegionalClient {
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

        Ok(ignore_not_found(result)?.and_then(|response| {
            response
                .web_acl_summary()
                .map(|summary| summary.web_acl_id().to_string())
        }))
    }

    async fn associate_web_acl(
        &self,
        web_acl_id: &str,
        resource_arn: &str,
    ) -> Result<(), CloudError> {
        self.client
            .associate_web_acl()
            .web_acl_id(web_acl_id)
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
