//! Elastic IPs for internet-facing network load balancers

use super::matching::match_by_resource_id;
use super::{DeployContext, Synthesizer, delete_with_retry};
use crate::aws::ec2::{AddressInfo, AllocateAddressInput};
use crate::aws::error::CODE_IP_ADDRESS_IN_USE;
use crate::model::ec2::{ElasticIp, ElasticIpSpec, ElasticIpStatus};
use crate::model::{Resource, Stack};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ElasticIpManager {
    ctx: Arc<DeployContext>,
}

impl ElasticIpManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, eip: &ElasticIp) -> Result<ElasticIpStatus> {
        let spec = eip.spec();
        info!(resource_id = %eip.id(), pool = ?spec.public_ipv4_pool, "Allocating Elastic IP");
        let address = self
            .ctx
            .cloud
            .ec2("AllocateAddress")
            .allocate_address(AllocateAddressInput {
                public_ipv4_pool: spec.public_ipv4_pool.clone(),
                tags: self.ctx.tracking.resource_tags(eip, &spec.tags),
            })
            .await?;
        info!(
            resource_id = %eip.id(),
            allocation_id = %address.allocation_id,
            public_ip = %address.public_ip,
            "Allocated Elastic IP"
        );
        Ok(ElasticIpStatus {
            allocation_id: address.allocation_id,
            public_ip: address.public_ip,
        })
    }

    /// Only tags can change; an address never moves between pools
    pub async fn update(&self, eip: &ElasticIp, observed: &AddressInfo) -> Result<ElasticIpStatus> {
        let spec = eip.spec();
        if spec.public_ipv4_pool.is_some() && spec.public_ipv4_pool != observed.public_ipv4_pool {
            warn!(
                allocation_id = %observed.allocation_id,
                desired = ?spec.public_ipv4_pool,
                observed = ?observed.public_ipv4_pool,
                "Elastic IP pool cannot change after allocation"
            );
        }

        reconcile_tags(
            &self.ctx.ec2_tagging,
            &observed.allocation_id,
            &self.ctx.tracking.resource_tags(eip, &spec.tags),
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(ElasticIpStatus {
            allocation_id: observed.allocation_id.clone(),
            public_ip: observed.public_ip.clone(),
        })
    }

    /// Release, waiting while the address is still associated
    pub async fn delete(&self, observed: &AddressInfo, cancel: &CancellationToken) -> Result<()> {
        info!(allocation_id = %observed.allocation_id, "Releasing Elastic IP");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "ReleaseAddress",
            &[CODE_IP_ADDRESS_IN_USE],
            move || async move {
                self.ctx
                    .cloud
                    .ec2("ReleaseAddress")
                    .release_address(&observed.allocation_id)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to release Elastic IP {}", observed.allocation_id))?;
        info!(allocation_id = %observed.allocation_id, "Released Elastic IP");
        Ok(())
    }
}

pub struct ElasticIpSynthesizer {
    ctx: Arc<DeployContext>,
    manager: ElasticIpManager,
    unmatched: Vec<AddressInfo>,
}

impl ElasticIpSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: ElasticIpManager::new(ctx.clone()),
            ctx,
            unmatched: Vec::new(),
        }
    }
}

#[async_trait]
impl Synthesizer for ElasticIpSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::ElasticIp.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .ec2_tagging
            .list_addresses(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let result = match_by_resource_id(
            ResourceKind::ElasticIp,
            &self.ctx.tracking,
            stack.list_resources::<ElasticIpSpec>(),
            observed,
        )?;

        for eip in &result.to_create {
            let status = self
                .manager
                .create(eip)
                .await
                .with_context(|| format!("Failed to allocate Elastic IP {}", eip.id()))?;
            eip.set_status(status);
        }
        for (eip, observed) in &result.matched {
            let status = self
                .manager
                .update(eip, observed)
                .await
                .with_context(|| format!("Failed to update Elastic IP {}", eip.id()))?;
            eip.set_status(status);
        }
        self.unmatched = result.unmatched;
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        for observed in std::mem::take(&mut self.unmatched) {
            self.manager.delete(&observed, cancel).await?;
        }
        Ok(())
    }
}
