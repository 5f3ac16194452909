//! Load balancers
//!
//! Everything happens in the first phase: stale load balancers are deleted
//! before new ones are created, so a renamed load balancer never collides
//! with its predecessor. A change of type or scheme cannot be applied in
//! place and replaces the load balancer.

use super::matching::match_by_resource_id;
use super::{DeployContext, Synthesizer, changed_attributes, delete_with_retry};
use crate::aws::elbv2::{CreateLoadBalancerInput, LoadBalancerInfo, SubnetMappingInput};
use crate::model::elbv2::{LoadBalancer, LoadBalancerSpec, LoadBalancerStatus};
use crate::model::{Resource, Stack, StringToken};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn status_of(lb: &LoadBalancerInfo) -> LoadBalancerStatus {
    LoadBalancerStatus {
        load_balancer_arn: lb.arn.clone(),
        dns_name: lb.dns_name.clone(),
        canonical_hosted_zone_id: lb.canonical_hosted_zone_id.clone(),
    }
}

/// Type and scheme are fixed at creation
fn needs_replacement(spec: &LoadBalancerSpec, observed: &LoadBalancerInfo) -> bool {
    spec.lb_type.as_str() != observed.lb_type || spec.scheme.as_str() != observed.scheme
}

fn resolve_subnet_mappings(spec: &LoadBalancerSpec) -> Result<Vec<SubnetMappingInput>> {
    spec.subnet_mappings
        .iter()
        .map(|mapping| -> Result<SubnetMappingInput> {
            Ok(SubnetMappingInput {
                subnet_id: mapping.subnet_id.clone(),
                allocation_id: mapping
                    .allocation_id
                    .as_ref()
                    .map(StringToken::resolve)
                    .transpose()?,
            })
        })
        .collect()
}

fn same_set<'a>(
    a: impl IntoIterator<Item = &'a String>,
    b: impl IntoIterator<Item = &'a String>,
) -> bool {
    a.into_iter().collect::<BTreeSet<_>>() == b.into_iter().collect::<BTreeSet<_>>()
}

pub struct LoadBalancerManager {
    ctx: Arc<DeployContext>,
}

impl LoadBalancerManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, lb: &LoadBalancer) -> Result<LoadBalancerStatus> {
        let spec = lb.spec();
        let security_groups = StringToken::resolve_all(&spec.security_groups)?;
        let subnet_mappings = resolve_subnet_mappings(spec)?;

        info!(
            resource_id = %lb.id(),
            name = %spec.name,
            lb_type = spec.lb_type.as_str(),
            scheme = spec.scheme.as_str(),
            "Creating load balancer"
        );
        let created = self
            .ctx
            .cloud
            .elbv2("CreateLoadBalancer")
            .create_load_balancer(CreateLoadBalancerInput {
                name: spec.name.clone(),
                lb_type: spec.lb_type.as_str().to_string(),
                scheme: spec.scheme.as_str().to_string(),
                ip_address_type: spec.ip_address_type.as_str().to_string(),
                subnet_mappings,
                security_groups,
                tags: self.ctx.tracking.resource_tags(lb, &spec.tags),
            })
            .await?;
        info!(resource_id = %lb.id(), arn = %created.arn, "Created load balancer");

        if !spec.load_balancer_attributes.is_empty() {
            self.ctx
                .cloud
                .elbv2("ModifyLoadBalancerAttributes")
                .modify_load_balancer_attributes(&created.arn, spec.load_balancer_attributes.clone())
                .await?;
        }
        Ok(status_of(&created))
    }

    pub async fn update(
        &self,
        lb: &LoadBalancer,
        observed: &LoadBalancerInfo,
    ) -> Result<LoadBalancerStatus> {
        let spec = lb.spec();
        let arn = observed.arn.as_str();
        let elbv2 = &self.ctx.cloud;

        let security_groups = StringToken::resolve_all(&spec.security_groups)?;
        if !same_set(&security_groups, &observed.security_groups) {
            info!(arn = %arn, security_groups = ?security_groups, "Modifying load balancer security groups");
            elbv2
                .elbv2("SetSecurityGroups")
                .set_security_groups(arn, security_groups)
                .await?;
        }

        let subnet_mappings = resolve_subnet_mappings(spec)?;
        if !same_set(
            subnet_mappings.iter().map(|m| &m.subnet_id),
            observed.subnet_mappings.iter().map(|m| &m.subnet_id),
        ) {
            info!(arn = %arn, "Modifying load balancer subnets");
            elbv2
                .elbv2("SetSubnets")
                .set_subnets(arn, subnet_mappings)
                .await?;
        }

        if spec.ip_address_type.as_str() != observed.ip_address_type {
            info!(
                arn = %arn,
                from = %observed.ip_address_type,
                to = spec.ip_address_type.as_str(),
                "Modifying load balancer IP address type"
            );
            elbv2
                .elbv2("SetIpAddressType")
                .set_ip_address_type(arn, spec.ip_address_type.as_str())
                .await?;
        }

        if !spec.load_balancer_attributes.is_empty() {
            let current = elbv2
                .elbv2("DescribeLoadBalancerAttributes")
                .describe_load_balancer_attributes(arn)
                .await?;
            let changed = changed_attributes(&spec.load_balancer_attributes, &current);
            if !changed.is_empty() {
                info!(arn = %arn, count = changed.len(), "Modifying load balancer attributes");
                elbv2
                    .elbv2("ModifyLoadBalancerAttributes")
                    .modify_load_balancer_attributes(arn, changed)
                    .await?;
            }
        }

        reconcile_tags(
            &self.ctx.elbv2_tagging,
            arn,
            &self.ctx.tracking.resource_tags(lb, &spec.tags),
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(status_of(observed))
    }

    pub async fn delete(&self, observed: &LoadBalancerInfo, cancel: &CancellationToken) -> Result<()> {
        info!(arn = %observed.arn, name = %observed.name, "Deleting load balancer");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteLoadBalancer",
            &[],
            move || async move {
                self.ctx
                    .cloud
                    .elbv2("DeleteLoadBalancer")
                    .delete_load_balancer(&observed.arn)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to delete load balancer {}", observed.arn))?;
        info!(arn = %observed.arn, "Deleted load balancer");
        Ok(())
    }
}

pub struct LoadBalancerSynthesizer {
    ctx: Arc<DeployContext>,
    manager: LoadBalancerManager,
}

impl LoadBalancerSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: LoadBalancerManager::new(ctx.clone()),
            ctx,
        }
    }
}

#[async_trait]
impl Synthesizer for LoadBalancerSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::LoadBalancer.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .elbv2_tagging
            .list_load_balancers(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let result = match_by_resource_id(
            ResourceKind::LoadBalancer,
            &self.ctx.tracking,
            stack.list_resources::<LoadBalancerSpec>(),
            observed,
        )?;

        let mut to_delete = result.unmatched;
        let mut to_create = result.to_create;
        let mut to_update = Vec::new();
        for (lb, observed) in result.matched {
            if needs_replacement(lb.spec(), &observed) {
                info!(
                    resource_id = %lb.id(),
                    arn = %observed.arn,
                    "Load balancer type or scheme changed, replacing"
                );
                to_delete.push(observed);
                to_create.push(lb);
            } else {
                to_update.push((lb, observed));
            }
        }

        for observed in &to_delete {
            self.manager.delete(observed, cancel).await?;
        }
        for lb in &to_create {
            let status = self
                .manager
                .create(lb)
                .await
                .with_context(|| format!("Failed to create load balancer {}", lb.id()))?;
            lb.set_status(status);
        }
        for (lb, observed) in &to_update {
            let status = self
                .manager
                .update(lb, observed)
                .await
                .with_context(|| format!("Failed to update load balancer {}", lb.id()))?;
            lb.set_status(status);
        }
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}
