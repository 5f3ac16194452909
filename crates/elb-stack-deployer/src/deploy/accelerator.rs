//! Global Accelerator accelerators
//!
//! Deleting an accelerator is a multi-step teardown: disable it, wait for
//! the change to deploy, delete its endpoint groups and listeners, then
//! delete the accelerator itself. A missing resource counts as done at every
//! step, so an interrupted teardown resumes where it stopped.

use super::matching::match_by_resource_id;
use super::{DeployContext, Synthesizer, delete_with_retry};
use crate::aws::error::{CODE_ACCELERATOR_NOT_DISABLED, ignore_not_found};
use crate::aws::globalaccelerator::{
    AcceleratorInfo, CreateAcceleratorInput, UpdateAcceleratorInput,
};
use crate::model::globalaccelerator::{Accelerator, AcceleratorSpec, AcceleratorStatus};
use crate::model::{Resource, Stack};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use crate::wait::wait_until;
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";

fn status_of(accelerator: &AcceleratorInfo) -> AcceleratorStatus {
    AcceleratorStatus {
        accelerator_arn: accelerator.arn.clone(),
        dns_name: accelerator.dns_name.clone(),
    }
}

/// Whether a setting that `UpdateAccelerator` can change differs
fn settings_drifted(spec: &AcceleratorSpec, observed: &AcceleratorInfo) -> bool {
    spec.name != observed.name
        || spec.ip_address_type != observed.ip_address_type
        || spec.enabled != observed.enabled
}

/// BYOIP addresses are fixed at creation; an unset list accepts any
fn addresses_drifted(spec: &AcceleratorSpec, observed: &AcceleratorInfo) -> bool {
    !spec.ip_addresses.is_empty()
        && spec.ip_addresses.iter().collect::<BTreeSet<_>>()
            != observed.ip_addresses.iter().collect::<BTreeSet<_>>()
}

pub struct AcceleratorManager {
    ctx: Arc<DeployContext>,
}

impl AcceleratorManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, accelerator: &Accelerator) -> Result<AcceleratorStatus> {
        let spec = accelerator.spec();
        info!(resource_id = %accelerator.id(), name = %spec.name, "Creating accelerator");
        let created = self
            .ctx
            .cloud
            .global_accelerator("CreateAccelerator")
            .create_accelerator(CreateAcceleratorInput {
                name: spec.name.clone(),
                ip_address_type: spec.ip_address_type.clone(),
                ip_addresses: spec.ip_addresses.clone(),
                enabled: spec.enabled,
                tags: self.ctx.tracking.resource_tags(accelerator, &spec.tags),
            })
            .await?;
        info!(resource_id = %accelerator.id(), arn = %created.arn, "Created accelerator");
        Ok(status_of(&created))
    }

    pub async fn update(
        &self,
        accelerator: &Accelerator,
        observed: &AcceleratorInfo,
    ) -> Result<AcceleratorStatus> {
        let spec = accelerator.spec();
        if addresses_drifted(spec, observed) {
            warn!(
                arn = %observed.arn,
                desired = ?spec.ip_addresses,
                observed = ?observed.ip_addresses,
                "Accelerator IP addresses cannot change after creation, ignoring"
            );
        }

        let mut current = observed.clone();
        if settings_drifted(spec, observed) {
            info!(arn = %observed.arn, "Modifying accelerator");
            current = self
                .ctx
                .cloud
                .global_accelerator("UpdateAccelerator")
                .update_accelerator(UpdateAcceleratorInput {
                    accelerator_arn: observed.arn.clone(),
                    name: spec.name.clone(),
                    ip_address_type: spec.ip_address_type.clone(),
                    enabled: spec.enabled,
                })
                .await?;
            info!(arn = %observed.arn, "Modified accelerator");
        }

        reconcile_tags(
            &self.ctx.ga_tagging,
            &observed.arn,
            &self.ctx.tracking.resource_tags(accelerator, &spec.tags),
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(status_of(&current))
    }

    pub async fn delete(&self, arn: &str, cancel: &CancellationToken) -> Result<()> {
        self.teardown(arn, cancel)
            .await
            .with_context(|| format!("Failed to delete accelerator {arn}"))
    }

    async fn teardown(&self, arn: &str, cancel: &CancellationToken) -> Result<()> {
        let ga = &self.ctx.cloud;
        let Some(accelerator) = ignore_not_found(
            ga.global_accelerator("DescribeAccelerator")
                .describe_accelerator(arn)
                .await,
        )?
        else {
            debug!(arn = %arn, "Accelerator already deleted");
            return Ok(());
        };

        info!(arn = %arn, name = %accelerator.name, "Deleting accelerator");
        if accelerator.enabled {
            info!(arn = %arn, "Disabling accelerator");
            ignore_not_found(
                ga.global_accelerator("UpdateAccelerator")
                    .update_accelerator(UpdateAcceleratorInput {
                        accelerator_arn: arn.to_string(),
                        name: accelerator.name.clone(),
                        ip_address_type: accelerator.ip_address_type.clone(),
                        enabled: false,
                    })
                    .await,
            )?;
        }

        wait_until(&self.ctx.retry, cancel, "accelerator deployment", move || async move {
            let current = ignore_not_found(
                ga.global_accelerator("DescribeAccelerator")
                    .describe_accelerator(arn)
                    .await,
            )?;
            Ok::<_, anyhow::Error>(
                current.is_none_or(|accelerator| accelerator.status != STATUS_IN_PROGRESS),
            )
        })
        .await?;

        let listeners = ignore_not_found(
            ga.global_accelerator("ListListeners")
                .list_listeners(arn)
                .await,
        )?
        .unwrap_or_default();
        for listener_arn in &listeners {
            let endpoint_groups = ignore_not_found(
                ga.global_accelerator("ListEndpointGroups")
                    .list_endpoint_groups(listener_arn)
                    .await,
            )?
            .unwrap_or_default();
            for endpoint_group_arn in &endpoint_groups {
                debug!(arn = %endpoint_group_arn, "Deleting endpoint group");
                ignore_not_found(
                    ga.global_accelerator("DeleteEndpointGroup")
                        .delete_endpoint_group(endpoint_group_arn)
                        .await,
                )?;
            }
            debug!(arn = %listener_arn, "Deleting accelerator listener");
            ignore_not_found(
                ga.global_accelerator("DeleteListener")
                    .delete_listener(listener_arn)
                    .await,
            )?;
        }

        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteAccelerator",
            &[CODE_ACCELERATOR_NOT_DISABLED],
            move || async move {
                ga.global_accelerator("DeleteAccelerator")
                    .delete_accelerator(arn)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await?;
        info!(arn = %arn, "Deleted accelerator");
        Ok(())
    }
}

pub struct AcceleratorSynthesizer {
    ctx: Arc<DeployContext>,
    manager: AcceleratorManager,
}

impl AcceleratorSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: AcceleratorManager::new(ctx.clone()),
            ctx,
        }
    }
}

#[async_trait]
impl Synthesizer for AcceleratorSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::Accelerator.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .ga_tagging
            .list_accelerators(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let result = match_by_resource_id(
            ResourceKind::Accelerator,
            &self.ctx.tracking,
            stack.list_resources::<AcceleratorSpec>(),
            observed,
        )?;

        for observed in &result.unmatched {
            self.manager.delete(&observed.arn, cancel).await?;
        }
        for accelerator in &result.to_create {
            let status = self
                .manager
                .create(accelerator)
                .await
                .with_context(|| format!("Failed to create accelerator {}", accelerator.id()))?;
            accelerator.set_status(status);
        }
        for (accelerator, observed) in &result.matched {
            let status = self
                .manager
                .update(accelerator, observed)
                .await
                .with_context(|| format!("Failed to update accelerator {}", accelerator.id()))?;
            accelerator.set_status(status);
        }
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}
