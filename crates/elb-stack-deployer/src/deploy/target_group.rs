//! Target groups
//!
//! Created and updated in the first phase so listeners can forward to them;
//! deleted in the second phase once no listener references them.

use super::matching::match_by_resource_id;
use super::{DeployContext, Synthesizer, changed_attributes, delete_with_retry};
use crate::aws::elbv2::{CreateTargetGroupInput, TargetGroupInfo};
use crate::aws::error::CODE_RESOURCE_IN_USE;
use crate::model::elbv2::{HealthCheckConfig, TargetGroup, TargetGroupSpec, TargetGroupStatus};
use crate::model::{Resource, Stack};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Whether any health check setting the spec pins differs from AWS
fn health_check_drifted(desired: &HealthCheckConfig, observed: &HealthCheckConfig) -> bool {
    fn differs<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
        desired.is_some() && desired != observed
    }

    differs(&desired.port, &observed.port)
        || differs(&desired.protocol, &observed.protocol)
        || differs(&desired.path, &observed.path)
        || differs(&desired.matcher, &observed.matcher)
        || differs(&desired.interval_seconds, &observed.interval_seconds)
        || differs(&desired.timeout_seconds, &observed.timeout_seconds)
        || differs(&desired.healthy_threshold_count, &observed.healthy_threshold_count)
        || differs(&desired.unhealthy_threshold_count, &observed.unhealthy_threshold_count)
}

pub struct TargetGroupManager {
    ctx: Arc<DeployContext>,
}

impl TargetGroupManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, tg: &TargetGroup) -> Result<TargetGroupStatus> {
        let spec = tg.spec();
        info!(resource_id = %tg.id(), name = %spec.name, "Creating target group");
        let created = self
            .ctx
            .cloud
            .elbv2("CreateTargetGroup")
            .create_target_group(CreateTargetGroupInput {
                name: spec.name.clone(),
                target_type: spec.target_type.as_str().to_string(),
                port: spec.port,
                protocol: spec.protocol.clone(),
                protocol_version: spec.protocol_version.clone(),
                ip_address_type: spec.ip_address_type.map(|t| t.as_str().to_string()),
                vpc_id: self.ctx.vpc_id.clone(),
                health_check: spec.health_check_config.clone(),
                tags: self.ctx.tracking.resource_tags(tg, &spec.tags),
            })
            .await?;
        info!(resource_id = %tg.id(), arn = %created.arn, "Created target group");

        if !spec.target_group_attributes.is_empty() {
            self.ctx
                .cloud
                .elbv2("ModifyTargetGroupAttributes")
                .modify_target_group_attributes(&created.arn, spec.target_group_attributes.clone())
                .await?;
        }
        Ok(TargetGroupStatus {
            target_group_arn: created.arn,
        })
    }

    pub async fn update(
        &self,
        tg: &TargetGroup,
        observed: &TargetGroupInfo,
    ) -> Result<TargetGroupStatus> {
        let spec = tg.spec();
        let elbv2 = &self.ctx.cloud;

        if health_check_drifted(&spec.health_check_config, &observed.health_check) {
            info!(arn = %observed.arn, "Modifying target group health check");
            elbv2
                .elbv2("ModifyTargetGroup")
                .modify_target_group(&observed.arn, spec.health_check_config.clone())
                .await?;
            info!(arn = %observed.arn, "Modified target group health check");
        }

        if !spec.target_group_attributes.is_empty() {
            let current = elbv2
                .elbv2("DescribeTargetGroupAttributes")
                .describe_target_group_attributes(&observed.arn)
                .await?;
            let changed = changed_attributes(&spec.target_group_attributes, &current);
            if !changed.is_empty() {
                info!(arn = %observed.arn, count = changed.len(), "Modifying target group attributes");
                elbv2
                    .elbv2("ModifyTargetGroupAttributes")
                    .modify_target_group_attributes(&observed.arn, changed)
                    .await?;
            }
        }

        reconcile_tags(
            &self.ctx.elbv2_tagging,
            &observed.arn,
            &self.ctx.tracking.resource_tags(tg, &spec.tags),
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(TargetGroupStatus {
            target_group_arn: observed.arn.clone(),
        })
    }

    /// Delete, waiting while a listener or rule still forwards to it
    pub async fn delete(&self, observed: &TargetGroupInfo, cancel: &CancellationToken) -> Result<()> {
        info!(arn = %observed.arn, "Deleting target group");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteTargetGroup",
            &[CODE_RESOURCE_IN_USE],
            move || async move {
                self.ctx
                    .cloud
                    .elbv2("DeleteTargetGroup")
                    .delete_target_group(&observed.arn)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to delete target group {}", observed.arn))?;
        info!(arn = %observed.arn, "Deleted target group");
        Ok(())
    }
}

pub struct TargetGroupSynthesizer {
    ctx: Arc<DeployContext>,
    manager: TargetGroupManager,
    unmatched: Vec<TargetGroupInfo>,
}

impl TargetGroupSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: TargetGroupManager::new(ctx.clone()),
            ctx,
            unmatched: Vec::new(),
        }
    }
}

#[async_trait]
impl Synthesizer for TargetGroupSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::TargetGroup.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .elbv2_tagging
            .list_target_groups(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let result = match_by_resource_id(
            ResourceKind::TargetGroup,
            &self.ctx.tracking,
            stack.list_resources::<TargetGroupSpec>(),
            observed,
        )?;

        for tg in &result.to_create {
            let status = self
                .manager
                .create(tg)
                .await
                .with_context(|| format!("Failed to create target group {}", tg.id()))?;
            tg.set_status(status);
        }
        for (tg, observed) in &result.matched {
            let status = self
                .manager
                .update(tg, observed)
                .await
                .with_context(|| format!("Failed to update target group {}", tg.id()))?;
            tg.set_status(status);
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
