//! Stack deployment
//!
//! Each resource kind has a manager, which performs create/update/delete
//! calls against AWS, and a synthesizer, which discovers the AWS resources
//! tagged for the stack, matches them against the desired resources and
//! drives the manager. [`StackDeployer`] runs the synthesizers in two
//! phases:
//!
//! 1. `synthesize` on every synthesizer in forward order
//! 2. `post_synthesize` on every synthesizer in reverse order
//!
//! Work that must happen after every dependent resource is gone, or after
//! a prerequisite exists, goes into the second phase.

mod accelerator;
mod elastic_ip;
mod endpoint_service;
mod listener;
mod load_balancer;
pub mod matching;
#[cfg(test)]
mod scenarios;
mod security_group;
mod shield;
mod target_group;
mod web_acl;

pub use accelerator::{AcceleratorManager, AcceleratorSynthesizer};
pub use elastic_ip::{ElasticIpManager, ElasticIpSynthesizer};
pub use endpoint_service::{EndpointServiceManager, EndpointServiceSynthesizer};
pub use listener::{ListenerManager, ListenerSynthesizer};
pub use load_balancer::{LoadBalancerManager, LoadBalancerSynthesizer};
pub use security_group::{SecurityGroupManager, SecurityGroupSynthesizer};
pub use shield::{ProtectionManager, ProtectionSynthesizer};
pub use target_group::{TargetGroupManager, TargetGroupSynthesizer};
pub use web_acl::{WebAclAssociationManager, WebAclAssociationSynthesizer};

use crate::aws::CloudApi;
use crate::aws::error::{find_cloud_error, has_code};
use crate::config::{DeployerConfig, FeatureFlags};
use crate::dns::HostedZoneLookup;
use crate::model::{ModelResource, Resource, ResourceSpec, Stack, StackId, StringToken};
use crate::model::elbv2::Attribute;
use crate::scan::StackScanner;
use crate::tagging::{Ec2TaggingManager, Elbv2TaggingManager, GlobalAcceleratorTaggingManager};
use crate::tracking::TrackingProvider;
use crate::wait::{RetryPolicy, WaitError, retry_on_error};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One resource kind's reconciliation
#[async_trait]
pub trait Synthesizer: Send {
    /// Name used in logs and error context
    fn name(&self) -> &str;

    /// First phase, run in forward order
    async fn synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()>;

    /// Second phase, run in reverse order
    async fn post_synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()>;
}

/// Everything the managers and synthesizers share
#[derive(Debug)]
pub struct DeployContext {
    pub cloud: CloudApi,
    pub tracking: TrackingProvider,
    pub ec2_tagging: Ec2TaggingManager,
    pub elbv2_tagging: Elbv2TaggingManager,
    pub ga_tagging: GlobalAcceleratorTaggingManager,
    pub hosted_zones: HostedZoneLookup,
    pub vpc_id: String,
    pub retry: RetryPolicy,
}

impl DeployContext {
    pub fn new(config: &DeployerConfig, cloud: CloudApi) -> Self {
        Self {
            tracking: TrackingProvider::new(config),
            ec2_tagging: Ec2TaggingManager::new(cloud.clone(), &config.vpc_id),
            elbv2_tagging: Elbv2TaggingManager::new(cloud.clone(), &config.vpc_id)
                .with_resource_groups_tagging(config.features.resource_groups_tagging),
            ga_tagging: GlobalAcceleratorTaggingManager::new(cloud.clone()),
            hosted_zones: HostedZoneLookup::new(cloud.clone()),
            vpc_id: config.vpc_id.clone(),
            retry: config.retry.policy(),
            cloud,
        }
    }
}

/// Run a delete, retrying while AWS reports one of `transient_codes`.
///
/// A resource that is already gone counts as deleted.
pub(crate) async fn delete_with_retry<F, Fut>(
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    transient_codes: &[&str],
    delete: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let result = retry_on_error(
        retry,
        cancel,
        operation,
        |err| has_code(err, transient_codes),
        delete,
    )
    .await;

    match result {
        Err(err) if find_cloud_error(&err).is_some_and(|e| e.is_not_found()) => {
            debug!(operation = %operation, "Already deleted");
            Ok(())
        }
        other => other,
    }
}

/// Desired attributes whose value differs from the observed one.
///
/// Attributes absent from the desired list keep their current value.
pub(crate) fn changed_attributes(desired: &[Attribute], observed: &[Attribute]) -> Vec<Attribute> {
    desired
        .iter()
        .filter(|attribute| {
            !observed
                .iter()
                .any(|current| current.key == attribute.key && current.value == attribute.value)
        })
        .cloned()
        .collect()
}

/// Key resources by the ARN their target token resolves to.
///
/// Two desired resources for one target mean the stack was built wrong.
pub(crate) fn group_by_resolved_arn<S, F>(
    resources: Vec<Arc<ModelResource<S>>>,
    arn_of: F,
) -> Result<IndexMap<String, Arc<ModelResource<S>>>>
where
    S: ResourceSpec,
    F: Fn(&S) -> &StringToken,
{
    let mut by_arn = IndexMap::new();
    for resource in resources {
        let arn = arn_of(resource.spec())
            .resolve()
            .with_context(|| format!("Failed to resolve target of {}", resource.id()))?;
        if let Some(existing) = by_arn.insert(arn.clone(), resource) {
            bail!(
                "should never happen: multiple {} resources desired for {arn} (one is {})",
                S::TYPE,
                existing.id()
            );
        }
    }
    Ok(by_arn)
}

/// Run `synthesize` forward, then `post_synthesize` in reverse.
///
/// Stops at the first error. A failed first phase skips the second one
/// entirely; nothing already applied is rolled back.
pub async fn run_synthesizers(
    synthesizers: &mut [Box<dyn Synthesizer>],
    stack: &Stack,
    cancel: &CancellationToken,
) -> Result<()> {
    for synthesizer in synthesizers.iter_mut() {
        check_cancelled(cancel, synthesizer.name())?;
        synthesizer
            .synthesize(stack, cancel)
            .await
            .with_context(|| format!("Failed to synthesize {}", synthesizer.name()))?;
    }

    for synthesizer in synthesizers.iter_mut().rev() {
        check_cancelled(cancel, synthesizer.name())?;
        synthesizer
            .post_synthesize(stack, cancel)
            .await
            .with_context(|| format!("Failed to post-synthesize {}", synthesizer.name()))?;
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken, name: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(WaitError::Cancelled {
            operation: format!("synthesis of {name}"),
        }
        .into());
    }
    Ok(())
}

/// Converges AWS on the resources of a stack
pub struct StackDeployer {
    ctx: Arc<DeployContext>,
    features: FeatureFlags,
    protections: Arc<ProtectionManager>,
}

impl StackDeployer {
    pub fn new(config: &DeployerConfig, cloud: CloudApi) -> Self {
        let ctx = Arc::new(DeployContext::new(config, cloud));
        Self {
            protections: Arc::new(ProtectionManager::new(ctx.clone())),
            features: config.features,
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<DeployContext> {
        &self.ctx
    }

    /// Synthesizers for one deployment, in forward order
    pub fn synthesizers(&self) -> Vec<Box<dyn Synthesizer>> {
        let ctx = &self.ctx;
        let mut synthesizers: Vec<Box<dyn Synthesizer>> = vec![
            Box::new(SecurityGroupSynthesizer::new(ctx.clone())),
            Box::new(ElasticIpSynthesizer::new(ctx.clone())),
            Box::new(TargetGroupSynthesizer::new(ctx.clone())),
            Box::new(EndpointServiceSynthesizer::new(ctx.clone())),
            Box::new(LoadBalancerSynthesizer::new(ctx.clone())),
            Box::new(ListenerSynthesizer::new(ctx.clone())),
        ];
        if self.features.wafv2 {
            synthesizers.push(Box::new(WebAclAssociationSynthesizer::new(ctx.clone())));
        }
        if self.features.shield {
            synthesizers.push(Box::new(ProtectionSynthesizer::new(self.protections.clone())));
        }
        if self.features.global_accelerator {
            synthesizers.push(Box::new(AcceleratorSynthesizer::new(ctx.clone())));
        }
        synthesizers
    }

    /// Converge AWS on `stack`.
    ///
    /// On success every resource in the stack has its status set.
    pub async fn deploy(&self, stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        info!(stack = %stack.id(), resources = stack.len(), "Deploying stack");
        let mut synthesizers = self.synthesizers();
        run_synthesizers(&mut synthesizers, stack, cancel)
            .await
            .with_context(|| format!("Failed to deploy stack {}", stack.id()))?;
        info!(stack = %stack.id(), "Stack deployed");
        Ok(())
    }

    /// Delete every AWS resource tagged for `stack_id`.
    ///
    /// An empty stack is deployed, so cleanup follows the same ordering and
    /// retry rules as any other deletion.
    pub async fn cleanup(&self, stack_id: &StackId, cancel: &CancellationToken) -> Result<()> {
        info!(stack = %stack_id, "Cleaning up stack");
        let stack = Stack::new(stack_id.clone());
        let mut synthesizers = self.synthesizers();
        run_synthesizers(&mut synthesizers, &stack, cancel)
            .await
            .with_context(|| format!("Failed to clean up stack {stack_id}"))?;
        info!(stack = %stack_id, "Stack cleaned up");
        Ok(())
    }

    /// Read-only view of what AWS holds for a stack
    pub fn scanner(&self) -> StackScanner {
        StackScanner::new(self.ctx.clone(), self.features)
    }
}
