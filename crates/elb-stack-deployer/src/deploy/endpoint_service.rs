//! VPC endpoint services and their allowed principals
//!
//! Phase assignment is inverted compared to the other kinds: stale services
//! are deleted in the first phase, before load balancers are touched, and
//! desired services are created or updated in the second phase, once the
//! network load balancers they front exist.

use super::matching::{MatchResult, match_by_resource_id};
use super::{DeployContext, Synthesizer, delete_with_retry};
use crate::aws::ec2::{CreateEndpointServiceInput, EndpointServiceInfo, ModifyEndpointServiceInput};
use crate::model::ec2::{
    VpcEndpointService, VpcEndpointServicePermissions, VpcEndpointServicePermissionsSpec,
    VpcEndpointServiceSpec, VpcEndpointServiceStatus,
};
use crate::model::{Resource, Stack, StringToken};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct EndpointServiceManager {
    ctx: Arc<DeployContext>,
}

impl EndpointServiceManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, service: &VpcEndpointService) -> Result<VpcEndpointServiceStatus> {
        let spec = service.spec();
        let nlb_arns = StringToken::resolve_all(&spec.network_load_balancer_arns)?;
        if let Some(name) = &spec.private_dns_name {
            self.check_private_dns_name(name).await;
        }
        info!(resource_id = %service.id(), load_balancers = ?nlb_arns, "Creating endpoint service");
        let created = self
            .ctx
            .cloud
            .ec2("CreateVpcEndpointServiceConfiguration")
            .create_endpoint_service(CreateEndpointServiceInput {
                acceptance_required: spec.acceptance_required,
                network_load_balancer_arns: nlb_arns,
                private_dns_name: spec.private_dns_name.clone(),
                tags: self.ctx.tracking.resource_tags(service, &spec.tags),
            })
            .await?;
        info!(resource_id = %service.id(), service_id = %created.service_id, "Created endpoint service");
        Ok(VpcEndpointServiceStatus {
            service_id: created.service_id,
        })
    }

    pub async fn update(
        &self,
        service: &VpcEndpointService,
        observed: &EndpointServiceInfo,
    ) -> Result<VpcEndpointServiceStatus> {
        let spec = service.spec();
        let nlb_arns = StringToken::resolve_all(&spec.network_load_balancer_arns)?;
        let modification = endpoint_service_changes(spec, &nlb_arns, observed);
        if modification.is_noop() {
            debug!(service_id = %observed.service_id, "Endpoint service up to date");
        } else {
            if let Some(name) = &modification.private_dns_name {
                self.check_private_dns_name(name).await;
            }
            info!(service_id = %observed.service_id, "Modifying endpoint service");
            self.ctx
                .cloud
                .ec2("ModifyVpcEndpointServiceConfiguration")
                .modify_endpoint_service(modification)
                .await?;
            info!(service_id = %observed.service_id, "Modified endpoint service");
        }

        reconcile_tags(
            &self.ctx.ec2_tagging,
            &observed.service_id,
            &self.ctx.tracking.resource_tags(service, &spec.tags),
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(VpcEndpointServiceStatus {
            service_id: observed.service_id.clone(),
        })
    }

    /// Warn when no public hosted zone of the account covers `name`.
    ///
    /// AWS verifies a private DNS name through a TXT record in public DNS;
    /// without a zone here the record has to be published elsewhere.
    async fn check_private_dns_name(&self, name: &str) {
        match self.ctx.hosted_zones.zone_for(name, false).await {
            Ok(Some(zone)) => {
                debug!(private_dns_name = %name, hosted_zone = %zone.id, "Private DNS name has a public zone");
            }
            Ok(None) => {
                warn!(private_dns_name = %name, "No public hosted zone covers the private DNS name");
            }
            Err(e) => {
                warn!(private_dns_name = %name, error = %format!("{e:#}"), "Could not check the private DNS name");
            }
        }
    }

    pub async fn delete(
        &self,
        observed: &EndpointServiceInfo,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(service_id = %observed.service_id, "Deleting endpoint service");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteVpcEndpointServiceConfigurations",
            &[],
            move || async move {
                self.ctx
                    .cloud
                    .ec2("DeleteVpcEndpointServiceConfigurations")
                    .delete_endpoint_service(&observed.service_id)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to delete endpoint service {}", observed.service_id))?;
        info!(service_id = %observed.service_id, "Deleted endpoint service");
        Ok(())
    }

    /// Converge the allowed principals of the referenced service
    pub async fn reconcile_permissions(
        &self,
        permissions: &VpcEndpointServicePermissions,
    ) -> Result<()> {
        let spec = permissions.spec();
        let service_id = spec.service_id.resolve()?;
        let current = self
            .ctx
            .cloud
            .ec2("DescribeVpcEndpointServicePermissions")
            .describe_endpoint_service_permissions(&service_id)
            .await?;
        let (add, remove) = principal_changes(spec, &current);
        if add.is_empty() && remove.is_empty() {
            debug!(service_id = %service_id, "Endpoint service permissions up to date");
        } else {
            info!(
                service_id = %service_id,
                add = ?add,
                remove = ?remove,
                "Modifying endpoint service permissions"
            );
            self.ctx
                .cloud
                .ec2("ModifyVpcEndpointServicePermissions")
                .modify_endpoint_service_permissions(&service_id, add, remove)
                .await?;
        }
        permissions.set_status(());
        Ok(())
    }
}

/// Modification bringing `observed` in line with `spec`
fn endpoint_service_changes(
    spec: &VpcEndpointServiceSpec,
    nlb_arns: &[String],
    observed: &EndpointServiceInfo,
) -> ModifyEndpointServiceInput {
    let desired: BTreeSet<&String> = nlb_arns.iter().collect();
    let current: BTreeSet<&String> = observed.network_load_balancer_arns.iter().collect();

    let mut modification = ModifyEndpointServiceInput {
        service_id: observed.service_id.clone(),
        add_network_load_balancer_arns: desired.difference(&current).map(|s| s.to_string()).collect(),
        remove_network_load_balancer_arns: current.difference(&desired).map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    if spec.acceptance_required != observed.acceptance_required {
        modification.acceptance_required = Some(spec.acceptance_required);
    }
    match (&spec.private_dns_name, &observed.private_dns_name) {
        (Some(desired), current) if Some(desired) != current.as_ref() => {
            modification.private_dns_name = Some(desired.clone());
        }
        (None, Some(_)) => modification.remove_private_dns_name = true,
        _ => {}
    }
    modification
}

/// Principals to allow and to revoke
fn principal_changes(
    spec: &VpcEndpointServicePermissionsSpec,
    current: &[String],
) -> (Vec<String>, Vec<String>) {
    let desired: BTreeSet<&String> = spec.allowed_principals.iter().collect();
    let current: BTreeSet<&String> = current.iter().collect();
    (
        desired.difference(&current).map(|s| s.to_string()).collect(),
        current.difference(&desired).map(|s| s.to_string()).collect(),
    )
}

pub struct EndpointServiceSynthesizer {
    ctx: Arc<DeployContext>,
    manager: EndpointServiceManager,
    pending: MatchResult<VpcEndpointServiceSpec, EndpointServiceInfo>,
}

impl EndpointServiceSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: EndpointServiceManager::new(ctx.clone()),
            ctx,
            pending: MatchResult::default(),
        }
    }
}

#[async_trait]
impl Synthesizer for EndpointServiceSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::VpcEndpointService.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .ec2_tagging
            .list_endpoint_services(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let mut result = match_by_resource_id(
            ResourceKind::VpcEndpointService,
            &self.ctx.tracking,
            stack.list_resources::<VpcEndpointServiceSpec>(),
            observed,
        )?;

        for observed in std::mem::take(&mut result.unmatched) {
            self.manager.delete(&observed, cancel).await?;
        }
        self.pending = result;
        Ok(())
    }

    async fn post_synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for service in &pending.to_create {
            let status = self
                .manager
                .create(service)
                .await
                .with_context(|| format!("Failed to create endpoint service {}", service.id()))?;
            service.set_status(status);
        }
        for (service, observed) in &pending.matched {
            let status = self
                .manager
                .update(service, observed)
                .await
                .with_context(|| format!("Failed to update endpoint service {}", service.id()))?;
            service.set_status(status);
        }

        for permissions in stack.list_resources::<VpcEndpointServicePermissionsSpec>() {
            self.manager
                .reconcile_permissions(&permissions)
                .await
                .with_context(|| {
                    format!("Failed to reconcile endpoint service permissions {}", permissions.id())
                })?;
        }
        Ok(())
    }
}
