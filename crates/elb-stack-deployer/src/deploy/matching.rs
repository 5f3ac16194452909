//! Pairing desired resources with the AWS resources found for them

use crate::aws::ec2::{AddressInfo, EndpointServiceInfo, SecurityGroupInfo};
use crate::aws::elbv2::{LoadBalancerInfo, TargetGroupInfo};
use crate::aws::globalaccelerator::AcceleratorInfo;
use crate::model::{ModelResource, Resource, ResourceSpec, Tags};
use crate::tracking::TrackingProvider;
use anyhow::{Result, bail};
use elb_stack_common::ResourceKind;
use indexmap::IndexMap;
use std::sync::Arc;

/// An AWS resource discovered through its ownership tags
pub trait Observed {
    /// AWS identifier (group ID, allocation ID, ARN, ...)
    fn identity(&self) -> &str;

    fn tags(&self) -> &Tags;
}

macro_rules! impl_observed {
    ($ty:ty, $field:ident) => {
        impl Observed for $ty {
            fn identity(&self) -> &str {
                &self.$field
            }

            fn tags(&self) -> &Tags {
                &self.tags
            }
        }
    };
}

impl_observed!(SecurityGroupInfo, group_id);
impl_observed!(AddressInfo, allocation_id);
impl_observed!(EndpointServiceInfo, service_id);
impl_observed!(LoadBalancerInfo, arn);
impl_observed!(TargetGroupInfo, arn);
impl_observed!(AcceleratorInfo, arn);

/// Outcome of matching desired against observed resources
#[derive(Debug)]
pub struct MatchResult<S: ResourceSpec, O> {
    /// Desired resources with their live AWS counterpart
    pub matched: Vec<(Arc<ModelResource<S>>, O)>,
    /// Desired resources with no AWS counterpart
    pub to_create: Vec<Arc<ModelResource<S>>>,
    /// AWS resources no desired resource claims, plus duplicates
    pub unmatched: Vec<O>,
}

impl<S: ResourceSpec, O> Default for MatchResult<S, O> {
    fn default() -> Self {
        Self {
            matched: Vec::new(),
            to_create: Vec::new(),
            unmatched: Vec::new(),
        }
    }
}

/// Match by the resource-ID tag.
///
/// When several AWS resources carry the same resource ID, the first one is
/// the match and the others are returned as unmatched. An observed resource
/// without a resource ID is an error.
pub fn match_by_resource_id<S: ResourceSpec, O: Observed>(
    kind: ResourceKind,
    tracking: &TrackingProvider,
    desired: Vec<Arc<ModelResource<S>>>,
    observed: Vec<O>,
) -> Result<MatchResult<S, O>> {
    let mut observed_by_id: IndexMap<String, Vec<O>> = IndexMap::new();
    for item in observed {
        let Some(resource_id) = tracking.resource_id_of(item.tags()) else {
            bail!("unexpected {kind} with no resourceID: {}", item.identity());
        };
        observed_by_id
            .entry(resource_id.to_string())
            .or_default()
            .push(item);
    }

    let mut result = MatchResult::default();
    for resource in desired {
        match observed_by_id.shift_remove(resource.id()) {
            Some(items) => {
                let mut items = items.into_iter();
                if let Some(first) = items.next() {
                    result.matched.push((resource, first));
                }
                result.unmatched.extend(items);
            }
            None => result.to_create.push(resource),
        }
    }
    result
        .unmatched
        .extend(observed_by_id.into_values().flatten());
    Ok(result)
}
