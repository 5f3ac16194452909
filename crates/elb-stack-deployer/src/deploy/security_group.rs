//! Security groups
//!
//! Created and updated in the first phase so load balancers can reference
//! them; deleted in the second phase, after load balancers let go of them.

use super::matching::match_by_resource_id;
use super::{DeployContext, Synthesizer, delete_with_retry};
use crate::aws::ec2::{CreateSecurityGroupInput, Ec2Filter, SecurityGroupInfo};
use crate::aws::error::{CODE_DEPENDENCY_VIOLATION, find_cloud_error};
use crate::model::ec2::{IpPermission, SecurityGroup, SecurityGroupSpec, SecurityGroupStatus};
use crate::model::{Resource, Stack};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SecurityGroupManager {
    ctx: Arc<DeployContext>,
}

impl SecurityGroupManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, sg: &SecurityGroup) -> Result<SecurityGroupStatus> {
        let spec = sg.spec();
        let tags = self.ctx.tracking.resource_tags(sg, &spec.tags);

        info!(resource_id = %sg.id(), group_name = %spec.group_name, "Creating security group");
        let group_id = self
            .ctx
            .cloud
            .ec2("CreateSecurityGroup")
            .create_security_group(CreateSecurityGroupInput {
                group_name: spec.group_name.clone(),
                description: spec.description.clone(),
                vpc_id: self.ctx.vpc_id.clone(),
                tags,
            })
            .await?;
        info!(resource_id = %sg.id(), group_id = %group_id, "Created security group");

        self.reconcile_ingress(&group_id, desired_ingress(sg), &[])
            .await?;
        Ok(SecurityGroupStatus { group_id })
    }

    pub async fn update(
        &self,
        sg: &SecurityGroup,
        observed: &SecurityGroupInfo,
    ) -> Result<SecurityGroupStatus> {
        let desired_tags = self.ctx.tracking.resource_tags(sg, &sg.spec().tags);
        reconcile_tags(
            &self.ctx.ec2_tagging,
            &observed.group_id,
            &desired_tags,
            ReconcileTagsOptions::default()
                .with_current_tags(observed.tags.clone())
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        self.reconcile_ingress(&observed.group_id, desired_ingress(sg), &observed.ingress)
            .await?;
        Ok(SecurityGroupStatus {
            group_id: observed.group_id.clone(),
        })
    }

    /// Delete, waiting out `DependencyViolation` while network interfaces
    /// still reference the group
    pub async fn delete(
        &self,
        observed: &SecurityGroupInfo,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(group_id = %observed.group_id, "Deleting security group");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteSecurityGroup",
            &[CODE_DEPENDENCY_VIOLATION],
            move || async move {
                self.ctx
                    .cloud
                    .ec2("DeleteSecurityGroup")
                    .delete_security_group(&observed.group_id)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to delete security group {}", observed.group_id))?;
        info!(group_id = %observed.group_id, "Deleted security group");
        Ok(())
    }

    /// Security group with the given name in the cluster VPC
    pub async fn find_by_name(&self, group_name: &str) -> Result<Option<SecurityGroupInfo>> {
        let groups = self
            .ctx
            .cloud
            .ec2("DescribeSecurityGroups")
            .describe_security_groups(vec![
                Ec2Filter::new("vpc-id", vec![self.ctx.vpc_id.clone()]),
                Ec2Filter::new("group-name", vec![group_name.to_string()]),
            ])
            .await?;
        Ok(groups.into_iter().next())
    }

    /// Authorize missing rules and revoke surplus ones
    async fn reconcile_ingress(
        &self,
        group_id: &str,
        desired: Vec<IpPermission>,
        observed: &[IpPermission],
    ) -> Result<()> {
        let (authorize, revoke) = diff_ingress(&desired, observed);
        if !authorize.is_empty() {
            info!(group_id = %group_id, rules = authorize.len(), "Authorizing ingress");
            self.ctx
                .cloud
                .ec2("AuthorizeSecurityGroupIngress")
                .authorize_ingress(group_id, authorize)
                .await?;
        }
        if !revoke.is_empty() {
            info!(group_id = %group_id, rules = revoke.len(), "Revoking ingress");
            self.ctx
                .cloud
                .ec2("RevokeSecurityGroupIngress")
                .revoke_ingress(group_id, revoke)
                .await?;
        }
        Ok(())
    }
}

fn desired_ingress(sg: &SecurityGroup) -> Vec<IpPermission> {
    sg.spec()
        .ingress
        .iter()
        .flat_map(IpPermission::flatten)
        .collect()
}

/// Rules to authorize and to revoke, both with one source per rule
fn diff_ingress(
    desired: &[IpPermission],
    observed: &[IpPermission],
) -> (Vec<IpPermission>, Vec<IpPermission>) {
    let authorize = desired
        .iter()
        .filter(|rule| !observed.contains(rule))
        .cloned()
        .collect();
    let revoke = observed
        .iter()
        .filter(|rule| !desired.contains(rule))
        .cloned()
        .collect();
    (authorize, revoke)
}

pub struct SecurityGroupSynthesizer {
    ctx: Arc<DeployContext>,
    manager: SecurityGroupManager,
    unmatched: Vec<SecurityGroupInfo>,
}

impl SecurityGroupSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: SecurityGroupManager::new(ctx.clone()),
            ctx,
            unmatched: Vec::new(),
        }
    }

    /// Create, falling back to adopting a group of the same name unless
    /// another stack or cluster owns it
    async fn create_or_adopt(&self, sg: &SecurityGroup) -> Result<SecurityGroupStatus> {
        let err = match self.manager.create(sg).await {
            Ok(status) => return Ok(status),
            Err(err) => err,
        };
        if !find_cloud_error(&err).is_some_and(|e| e.is_duplicate()) {
            return Err(err);
        }

        let group_name = &sg.spec().group_name;
        let existing = self
            .manager
            .find_by_name(group_name)
            .await?
            .ok_or_else(|| {
                anyhow!("security group {group_name} reported as duplicate but not found")
            })?;
        if let Some(owner) = self.ctx.tracking.foreign_owner(&existing.tags, sg.stack_id()) {
            bail!("security group {group_name} is owned by {owner}");
        }
        info!(
            resource_id = %sg.id(),
            group_id = %existing.group_id,
            "Adopting existing security group"
        );
        self.manager.update(sg, &existing).await
    }
}

#[async_trait]
impl Synthesizer for SecurityGroupSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::SecurityGroup.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        let observed = self
            .ctx
            .ec2_tagging
            .list_security_groups(&self.ctx.tracking.stack_tag_filters(stack.id()))
            .await?;
        let result = match_by_resource_id(
            ResourceKind::SecurityGroup,
            &self.ctx.tracking,
            stack.list_resources::<SecurityGroupSpec>(),
            observed,
        )?;

        for sg in &result.to_create {
            let status = self
                .create_or_adopt(sg)
                .await
                .with_context(|| format!("Failed to create security group {}", sg.id()))?;
            sg.set_status(status);
        }
        for (sg, observed) in &result.matched {
            let status = self
                .manager
                .update(sg, observed)
                .await
                .with_context(|| format!("Failed to update security group {}", sg.id()))?;
            sg.set_status(status);
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
