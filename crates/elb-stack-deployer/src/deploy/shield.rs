//! Shield Advanced protections
//!
//! Subscription state and protections are read through TTL caches. The
//! manager is shared across deployments so that the caches outlive a single
//! reconciliation.

use super::{DeployContext, Synthesizer, group_by_resolved_arn};
use crate::aws::error::ignore_not_found;
use crate::aws::shield::ProtectionInfo;
use crate::cache::TtlCache;
use crate::model::shield::{ProtectionSpec, ProtectionStatus};
use crate::model::{Resource, Stack};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use elb_stack_common::defaults::{
    SHIELD_PROTECTION_CACHE_TTL_SECS, SHIELD_PROTECTION_NAME, SHIELD_SUBSCRIPTION_CACHE_TTL_SECS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct ProtectionManager {
    ctx: Arc<DeployContext>,
    subscription: TtlCache<(), bool>,
    protections: TtlCache<String, Option<ProtectionInfo>>,
}

impl ProtectionManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            ctx,
            subscription: TtlCache::new(Duration::from_secs(SHIELD_SUBSCRIPTION_CACHE_TTL_SECS)),
            protections: TtlCache::new(Duration::from_secs(SHIELD_PROTECTION_CACHE_TTL_SECS)),
        }
    }

    pub async fn subscription_active(&self) -> Result<bool> {
        if let Some(active) = self.subscription.get(&()) {
            return Ok(active);
        }
        let active = self
            .ctx
            .cloud
            .shield("GetSubscriptionState")
            .subscription_active()
            .await?;
        self.subscription.insert((), active);
        Ok(active)
    }

    /// Protection covering `resource_arn`, if any
    pub async fn protection(&self, resource_arn: &str) -> Result<Option<ProtectionInfo>> {
        let key = resource_arn.to_string();
        if let Some(protection) = self.protections.get(&key) {
            return Ok(protection);
        }
        let protection = self
            .ctx
            .cloud
            .shield("DescribeProtection")
            .describe_protection(resource_arn)
            .await?;
        self.protections.insert(key, protection.clone());
        Ok(protection)
    }

    pub async fn create(&self, resource_arn: &str) -> Result<ProtectionInfo> {
        info!(resource_arn = %resource_arn, "Creating Shield protection");
        let id = self
            .ctx
            .cloud
            .shield("CreateProtection")
            .create_protection(SHIELD_PROTECTION_NAME, resource_arn)
            .await?;
        info!(resource_arn = %resource_arn, protection_id = %id, "Created Shield protection");

        let protection = ProtectionInfo {
            id,
            name: SHIELD_PROTECTION_NAME.to_string(),
            resource_arn: resource_arn.to_string(),
        };
        self.protections
            .insert(resource_arn.to_string(), Some(protection.clone()));
        Ok(protection)
    }

    pub async fn delete(&self, protection: &ProtectionInfo) -> Result<()> {
        info!(protection_id = %protection.id, resource_arn = %protection.resource_arn, "Deleting Shield protection");
        ignore_not_found(
            self.ctx
                .cloud
                .shield("DeleteProtection")
                .delete_protection(&protection.id)
                .await,
        )?;
        self.protections.invalidate(&protection.resource_arn);
        info!(protection_id = %protection.id, "Deleted Shield protection");
        Ok(())
    }

    /// Converge the protection state of one resource
    pub async fn reconcile(&self, resource_arn: &str, enabled: bool) -> Result<ProtectionStatus> {
        let subscribed = self.subscription_active().await?;
        if enabled && !subscribed {
            bail!("Shield Advanced subscription is not active, cannot protect {resource_arn}");
        }
        if !subscribed {
            debug!(resource_arn = %resource_arn, "No Shield Advanced subscription, nothing to remove");
            return Ok(ProtectionStatus {
                protection_id: None,
            });
        }

        let existing = self.protection(resource_arn).await?;
        match (enabled, existing) {
            (true, Some(protection)) => Ok(ProtectionStatus {
                protection_id: Some(protection.id),
            }),
            (true, None) => {
                let protection = self.create(resource_arn).await?;
                Ok(ProtectionStatus {
                    protection_id: Some(protection.id),
                })
            }
            (false, Some(protection)) if protection.name == SHIELD_PROTECTION_NAME => {
                self.delete(&protection).await?;
                Ok(ProtectionStatus {
                    protection_id: None,
                })
            }
            (false, Some(protection)) => {
                warn!(
                    resource_arn = %resource_arn,
                    protection_id = %protection.id,
                    name = %protection.name,
                    "Leaving Shield protection not created by elb-stack"
                );
                Ok(ProtectionStatus {
                    protection_id: None,
                })
            }
            (false, None) => Ok(ProtectionStatus {
                protection_id: None,
            }),
        }
    }
}

pub struct ProtectionSynthesizer {
    manager: Arc<ProtectionManager>,
}

impl ProtectionSynthesizer {
    pub fn new(manager: Arc<ProtectionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Synthesizer for ProtectionSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::ShieldProtection.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let protections = group_by_resolved_arn(
            stack.list_resources::<ProtectionSpec>(),
            |spec| &spec.resource_arn,
        )?;
        for (resource_arn, protection) in protections {
            let status = self
                .manager
                .reconcile(&resource_arn, protection.spec().enabled)
                .await
                .with_context(|| format!("Failed to reconcile Shield protection {}", protection.id()))?;
            protection.set_status(status);
        }
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}
