//! Listeners
//!
//! Listeners are not matched by tag: each load balancer has at most one
//! listener per port, so the port is the identity within a load balancer.

use super::{DeployContext, Synthesizer, delete_with_retry};
use crate::aws::elbv2::{ListenerInfo, ListenerInput, ResolvedAction, WeightedTargetGroup};
use crate::model::elbv2::{Action, Listener, ListenerSpec, ListenerStatus, LoadBalancerSpec};
use crate::model::{Resource, Stack, Tags};
use crate::tagging::{ReconcileTagsOptions, reconcile_tags};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use elb_stack_common::ResourceKind;
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Resolve the target group tokens of an action
fn resolve_action(action: &Action) -> Result<ResolvedAction> {
    let target_groups = action
        .forward_config
        .iter()
        .flat_map(|config| config.target_groups.iter())
        .map(|tuple| -> Result<WeightedTargetGroup> {
            Ok(WeightedTargetGroup {
                target_group_arn: tuple.target_group_arn.resolve()?,
                weight: tuple.weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedAction {
        action_type: action.action_type.as_str().to_string(),
        target_groups,
        fixed_response: action.fixed_response_config.clone(),
        redirect: action.redirect_config.clone(),
    })
}

fn listener_input(listener: &Listener, tags: Tags) -> Result<ListenerInput> {
    let spec = listener.spec();
    Ok(ListenerInput {
        port: spec.port,
        protocol: spec.protocol.clone(),
        default_actions: spec
            .default_actions
            .iter()
            .map(resolve_action)
            .collect::<Result<_>>()?,
        certificates: spec
            .certificates
            .iter()
            .map(|cert| cert.certificate_arn.clone())
            .collect(),
        ssl_policy: spec.ssl_policy.clone(),
        alpn_policy: spec.alpn_policy.clone(),
        tags,
    })
}

/// Whether any setting the listener pins differs from AWS
fn listener_drifted(desired: &ListenerInput, observed: &ListenerInfo) -> bool {
    let actions_drifted = desired.default_actions.len() != observed.default_actions.len()
        || !desired
            .default_actions
            .iter()
            .zip(&observed.default_actions)
            .all(|(desired, observed)| desired.matches(observed));
    let certificates_drifted = desired.certificates.iter().collect::<BTreeSet<_>>()
        != observed.certificates.iter().collect::<BTreeSet<_>>();

    desired.protocol != observed.protocol
        || actions_drifted
        || certificates_drifted
        || (desired.ssl_policy.is_some() && desired.ssl_policy != observed.ssl_policy)
        || (!desired.alpn_policy.is_empty() && desired.alpn_policy != observed.alpn_policy)
}

pub struct ListenerManager {
    ctx: Arc<DeployContext>,
}

impl ListenerManager {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, listener: &Listener, lb_arn: &str) -> Result<ListenerStatus> {
        let tags = self
            .ctx
            .tracking
            .resource_tags(listener, &listener.spec().tags);
        let input = listener_input(listener, tags)?;
        info!(resource_id = %listener.id(), lb_arn = %lb_arn, port = input.port, "Creating listener");
        let created = self
            .ctx
            .cloud
            .elbv2("CreateListener")
            .create_listener(lb_arn, input)
            .await?;
        info!(resource_id = %listener.id(), arn = %created.arn, "Created listener");
        Ok(ListenerStatus {
            listener_arn: created.arn,
        })
    }

    pub async fn update(&self, listener: &Listener, observed: &ListenerInfo) -> Result<ListenerStatus> {
        let tags = self
            .ctx
            .tracking
            .resource_tags(listener, &listener.spec().tags);
        let input = listener_input(listener, tags.clone())?;

        if listener_drifted(&input, observed) {
            info!(arn = %observed.arn, port = observed.port, "Modifying listener");
            self.ctx
                .cloud
                .elbv2("ModifyListener")
                .modify_listener(&observed.arn, input)
                .await?;
            info!(arn = %observed.arn, "Modified listener");
        } else {
            debug!(arn = %observed.arn, "Listener up to date");
        }

        reconcile_tags(
            &self.ctx.elbv2_tagging,
            &observed.arn,
            &tags,
            ReconcileTagsOptions::default()
                .with_ignored_tag_keys(self.ctx.tracking.ignored_tag_keys()),
        )
        .await?;

        Ok(ListenerStatus {
            listener_arn: observed.arn.clone(),
        })
    }

    pub async fn delete(&self, observed: &ListenerInfo, cancel: &CancellationToken) -> Result<()> {
        info!(arn = %observed.arn, port = observed.port, "Deleting listener");
        delete_with_retry(
            &self.ctx.retry,
            cancel,
            "DeleteListener",
            &[],
            move || async move {
                self.ctx
                    .cloud
                    .elbv2("DeleteListener")
                    .delete_listener(&observed.arn)
                    .await
                    .map_err(anyhow::Error::from)
            },
        )
        .await
        .with_context(|| format!("Failed to delete listener {}", observed.arn))?;
        info!(arn = %observed.arn, "Deleted listener");
        Ok(())
    }
}

/// Fail before any call if two listeners of one load balancer share a port
fn ensure_unique_ports(lb_arn: &str, desired: &[Arc<Listener>]) -> Result<()> {
    let mut by_port: HashMap<i32, &Arc<Listener>> = HashMap::new();
    for listener in desired {
        let port = listener.spec().port;
        if let Some(existing) = by_port.insert(port, listener) {
            bail!(
                "should never happen: multiple listeners desired on port {port} of {lb_arn} ({} and {})",
                existing.id(),
                listener.id()
            );
        }
    }
    Ok(())
}

pub struct ListenerSynthesizer {
    manager: ListenerManager,
}

impl ListenerSynthesizer {
    pub fn new(ctx: Arc<DeployContext>) -> Self {
        Self {
            manager: ListenerManager::new(ctx),
        }
    }

    async fn synthesize_load_balancer(
        &self,
        lb_arn: &str,
        desired: Vec<Arc<Listener>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_unique_ports(lb_arn, &desired)?;
        let observed = self
            .manager
            .ctx
            .cloud
            .elbv2("DescribeListeners")
            .describe_listeners(lb_arn)
            .await
            .with_context(|| format!("Failed to list listeners of {lb_arn}"))?;
        let mut observed_by_port: IndexMap<i32, ListenerInfo> = observed
            .into_iter()
            .map(|listener| (listener.port, listener))
            .collect();

        let mut to_create = Vec::new();
        let mut to_update = Vec::new();
        for listener in desired {
            match observed_by_port.shift_remove(&listener.spec().port) {
                Some(observed) => to_update.push((listener, observed)),
                None => to_create.push(listener),
            }
        }

        for observed in observed_by_port.values() {
            self.manager.delete(observed, cancel).await?;
        }
        for listener in &to_create {
            let status = self
                .manager
                .create(listener, lb_arn)
                .await
                .with_context(|| format!("Failed to create listener {}", listener.id()))?;
            listener.set_status(status);
        }
        for (listener, observed) in &to_update {
            let status = self
                .manager
                .update(listener, observed)
                .await
                .with_context(|| format!("Failed to update listener {}", listener.id()))?;
            listener.set_status(status);
        }
        Ok(())
    }
}

#[async_trait]
impl Synthesizer for ListenerSynthesizer {
    fn name(&self) -> &str {
        ResourceKind::Listener.as_str()
    }

    async fn synthesize(&mut self, stack: &Stack, cancel: &CancellationToken) -> Result<()> {
        // Every load balancer of the stack is visited, including ones with no
        // desired listener, so that their leftover listeners are deleted.
        let mut lb_arns: IndexSet<String> = stack
            .list_resources::<LoadBalancerSpec>()
            .iter()
            .filter_map(|lb| lb.read_status(|status| status.load_balancer_arn.clone()))
            .collect();

        let mut desired_by_lb: IndexMap<String, Vec<Arc<Listener>>> = IndexMap::new();
        for listener in stack.list_resources::<ListenerSpec>() {
            let lb_arn = listener
                .spec()
                .load_balancer_arn
                .resolve()
                .with_context(|| format!("Failed to resolve load balancer of listener {}", listener.id()))?;
            lb_arns.insert(lb_arn.clone());
            desired_by_lb.entry(lb_arn).or_default().push(listener);
        }

        for lb_arn in lb_arns {
            let desired = desired_by_lb.shift_remove(&lb_arn).unwrap_or_default();
            self.synthesize_load_balancer(&lb_arn, desired, cancel).await?;
        }
        Ok(())
    }

    async fn post_synthesize(&mut self, _stack: &Stack, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::elbv2::{Certificate, TargetGroupTuple};
    use crate::model::StackId;

    fn listener(actions: Vec<Action>) -> Listener {
        listener_on("443", 443, actions)
    }

    fn listener_on(id: &str, port: i32, actions: Vec<Action>) -> Listener {
        Listener::new(
            StackId::new("ns", "web"),
            id,
            ListenerSpec {
                load_balancer_arn: "arn:lb".into(),
                port,
                protocol: "HTTPS".to_string(),
                default_actions: actions,
                certificates: vec![Certificate {
                    certificate_arn: "arn:cert".to_string(),
                }],
                ssl_policy: Some("ELBSecurityPolicy-TLS13-1-2-2021-06".to_string()),
                alpn_policy: Vec::new(),
                tags: Tags::new(),
            },
        )
    }

    fn observed(input: &ListenerInput) -> ListenerInfo {
        ListenerInfo {
            arn: "arn:listener".to_string(),
            load_balancer_arn: "arn:lb".to_string(),
            port: input.port,
            protocol: input.protocol.clone(),
            default_actions: input.default_actions.clone(),
            certificates: input.certificates.clone(),
            ssl_policy: input.ssl_policy.clone(),
            alpn_policy: vec!["None".to_string()],
        }
    }

    #[test]
    fn test_weighted_forward_resolution() {
        let mut action = Action::forward("arn:tg-1".into());
        if let Some(config) = action.forward_config.as_mut() {
            config.target_groups.push(TargetGroupTuple {
                target_group_arn: "arn:tg-2".into(),
                weight: Some(10),
            });
        }
        let resolved = resolve_action(&action).unwrap();
        assert_eq!(resolved.action_type, "forward");
        assert_eq!(
            resolved.target_groups,
            [
                WeightedTargetGroup {
                    target_group_arn: "arn:tg-1".to_string(),
                    weight: None,
                },
                WeightedTargetGroup {
                    target_group_arn: "arn:tg-2".to_string(),
                    weight: Some(10),
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_port_is_rejected() {
        let forward = || vec![Action::forward("arn:tg".into())];
        let unique = [
            Arc::new(listener_on("443", 443, forward())),
            Arc::new(listener_on("80", 80, forward())),
        ];
        ensure_unique_ports("arn:lb", &unique).unwrap();

        let clashing = [
            Arc::new(listener_on("https", 443, forward())),
            Arc::new(listener_on("https-alt", 443, forward())),
        ];
        let err = ensure_unique_ports("arn:lb", &clashing).unwrap_err();
        assert_eq!(
            err.to_string(),
            "should never happen: multiple listeners desired on port 443 of arn:lb (https and https-alt)"
        );
    }

    #[test]
    fn test_converged_listener_has_no_drift() {
        let input = listener_input(&listener(vec![Action::forward("arn:tg".into())]), Tags::new())
            .unwrap();
        let mut current = observed(&input);
        current.default_actions[0].target_groups[0].weight = Some(1);
        assert!(!listener_drifted(&input, &current));
    }

    #[test]
    fn test_action_change_is_drift() {
        let input = listener_input(&listener(vec![Action::fixed_response("404")]), Tags::new())
            .unwrap();
        let mut current = observed(&input);
        current.default_actions = vec![ResolvedAction {
            action_type: "forward".to_string(),
            target_groups: vec![WeightedTargetGroup {
                target_group_arn: "arn:tg".to_string(),
                weight: Some(1),
            }],
            fixed_response: None,
            redirect: None,
        }];
        assert!(listener_drifted(&input, &current));
    }

    #[test]
    fn test_certificate_change_is_drift() {
        let input = listener_input(&listener(vec![Action::forward("arn:tg".into())]), Tags::new())
            .unwrap();
        let mut current = observed(&input);
        current.certificates = vec!["arn:old-cert".to_string()];
        assert!(listener_drifted(&input, &current));
    }
}
