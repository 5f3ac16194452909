//! Read-only discovery of the AWS resources tagged for a stack

use crate::config::FeatureFlags;
use crate::deploy::DeployContext;
use crate::model::{StackId, Tags};
use anyhow::{Context, Result};
use elb_stack_common::ResourceKind;
use std::sync::Arc;
use tracing::debug;

/// One AWS resource belonging to a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    pub kind: ResourceKind,
    /// ARN or AWS ID
    pub id: String,
    pub name: Option<String>,
    /// Value of the resource-id tracking tag
    pub resource_id: Option<String>,
}

pub struct StackScanner {
    ctx: Arc<DeployContext>,
    features: FeatureFlags,
}

impl StackScanner {
    pub fn new(ctx: Arc<DeployContext>, features: FeatureFlags) -> Self {
        Self { ctx, features }
    }

    fn tagged(
        &self,
        kind: ResourceKind,
        id: String,
        name: Option<String>,
        tags: &Tags,
    ) -> DiscoveredResource {
        DiscoveredResource {
            kind,
            id,
            name,
            resource_id: self.ctx.tracking.resource_id_of(tags).map(str::to_string),
        }
    }

    /// Everything AWS holds for `stack_id`, in synthesis order
    pub async fn scan(&self, stack_id: &StackId) -> Result<Vec<DiscoveredResource>> {
        let filters = self.ctx.tracking.stack_tag_filters(stack_id);
        let mut found = Vec::new();

        for sg in self.ctx.ec2_tagging.list_security_groups(&filters).await? {
            found.push(self.tagged(
                ResourceKind::SecurityGroup,
                sg.group_id,
                Some(sg.group_name),
                &sg.tags,
            ));
        }
        for address in self.ctx.ec2_tagging.list_addresses(&filters).await? {
            found.push(self.tagged(
                ResourceKind::ElasticIp,
                address.allocation_id,
                Some(address.public_ip),
                &address.tags,
            ));
        }
        for tg in self.ctx.elbv2_tagging.list_target_groups(&filters).await? {
            found.push(self.tagged(ResourceKind::TargetGroup, tg.arn, Some(tg.name), &tg.tags));
        }
        for service in self.ctx.ec2_tagging.list_endpoint_services(&filters).await? {
            found.push(self.tagged(
                ResourceKind::VpcEndpointService,
                service.service_id,
                None,
                &service.tags,
            ));
        }

        let load_balancers = self.ctx.elbv2_tagging.list_load_balancers(&filters).await?;
        for lb in &load_balancers {
            found.push(self.tagged(
                ResourceKind::LoadBalancer,
                lb.arn.clone(),
                Some(lb.name.clone()),
                &lb.tags,
            ));
        }
        for lb in &load_balancers {
            let listeners = self
                .ctx
                .cloud
                .elbv2("DescribeListeners")
                .describe_listeners(&lb.arn)
                .await
                .with_context(|| format!("Failed to list listeners of {}", lb.arn))?;
            for listener in listeners {
                found.push(DiscoveredResource {
                    kind: ResourceKind::Listener,
                    id: listener.arn,
                    name: Some(format!("{}:{}", listener.protocol, listener.port)),
                    resource_id: Some(listener.port.to_string()),
                });
            }
        }

        if self.features.wafv2 {
            for lb in &load_balancers {
                let web_acl = self
                    .ctx
                    .cloud
                    .wafv2("GetWebACLForResource")
                    .get_web_acl_for_resource(&lb.arn)
                    .await
                    .with_context(|| format!("Failed to get web ACL of {}", lb.arn))?;
                if let Some(web_acl_arn) = web_acl {
                    found.push(DiscoveredResource {
                        kind: ResourceKind::WebAclAssociation,
                        id: lb.arn.clone(),
                        name: Some(web_acl_arn),
                        resource_id: None,
                    });
                }
            }
        }

        if self.features.shield && !load_balancers.is_empty() {
            let shield = self.ctx.cloud.shield("GetSubscriptionState");
            if shield.subscription_active().await? {
                for lb in &load_balancers {
                    let protection = self
                        .ctx
                        .cloud
                        .shield("DescribeProtection")
                        .describe_protection(&lb.arn)
                        .await
                        .with_context(|| format!("Failed to describe protection of {}", lb.arn))?;
                    if let Some(protection) = protection {
                        found.push(DiscoveredResource {
                            kind: ResourceKind::ShieldProtection,
                            id: protection.id,
                            name: Some(protection.name),
                            resource_id: None,
                        });
                    }
                }
            } else {
                debug!("No Shield Advanced subscription, skipping protections");
            }
        }

        if self.features.global_accelerator {
            for accelerator in self.ctx.ga_tagging.list_accelerators(&filters).await? {
                found.push(self.tagged(
                    ResourceKind::Accelerator,
                    accelerator.arn,
                    Some(accelerator.name),
                    &accelerator.tags,
                ));
            }
        }

        debug!(stack = %stack_id, count = found.len(), "Scanned stack");
        Ok(found)
    }
}
