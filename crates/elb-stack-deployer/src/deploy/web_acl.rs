//! WAFv2 web ACL associations

use super::{DeployContext, Synthesizer, group_by_resolved_arn};
use crate::model::wafv2::{WebAclAssociation, WebAclAssociationSpec};
use crate::model::{Resource, Stack};
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct WebAclAssociationManager {
    ctx: Arc<DeployContext>,
}

impl WebAclAssociationManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    /// Make `resource_arn` carry exactly `web_acl_arn`, or nothing for `None`
    pub async fn reconcile(&self, resource_arn: &str, web_acl_arn: Option<&str>) -> Result<()> {
        let current = self
            .ctx
            .cloud
            .wafv2("GetWebACLForResource")
            .get_web_acl_for_resource(resource_arn)
            .await?;

        match (web_acl_arn, current.as_deref()) {
            (Some(desired), Some(current)) if desired == current => {
                debug!(resource_arn = %resource_arn, web_acl_arn = %desired, "Web ACL already associated");
            }
            (Some(desired), _) => {
                info!(resource_arn = %resource_arn, web_acl_arn = %desired, "Associating web ACL");
                self.ctx
                    .cloud
                    .wafv2("AssociateWebACL")
                    .associate_web_acl(desired, resource_arn)
                    .await?;
                info!(resource_arn = %resource_arn, "Associated web ACL");
            }
            (None, Some(current)) => {
                info!(resource_arn = %resource_arn, web_acl_arn = %current, "Disassociating web ACL");
                self.ctx
                    .cloud
                    .wafv2("DisassociateWebACL")
                    .disassociate_web_acl(resource_arn)
                    .await?;
                info!(resource_arn = %resource_arn, "Disassociated web ACL");
            }
            (None, None) => {}
        }
        Ok(())
    }
}

pub struct WebAclAssociationSynthesizer {
    manager: WebAclAssociationManager,
}

impl WebAclAssociationSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: WebAclAssociationManager::new(ctx),
        }
    }
}

#[async_trait]
impl Synthesizer for WebAclAssociationSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::WebAclAssociation.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let associations = group_by_resolved_arn(
            stack.list_resources::<WebAclAssociationSpec>(),
            |spec| &spec.resource_arn,
        )?;
        for (resource_arn, association) in associations {
            self.manager
                .reconcile(&resource_arn, association.spec().web_acl_arn.as_deref())
                .await
                .with_context(|| {
                    format!("Failed to reconcile web ACL association {}", association.id())
                })?;
            association.set_status(());
        }
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}
