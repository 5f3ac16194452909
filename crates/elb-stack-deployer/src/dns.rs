//! Hosted zone lookup for DNS names
//!
//! The account's zone list changes rarely and Route53 throttles listing
//! hard, so it is read through a five-minute cache.

use crate::aws::CloudApi;
use crate::aws::route53::HostedZoneInfo;
use crate::cache::TtlCache;
use anyhow::{Context, Result};
use elb_stack_common::defaults::ROUTE53_HOSTED_ZONE_CACHE_TTL_SECS;
use std::time::Duration;

#[derive(Debug)]
pub struct HostedZoneLookup {
    cloud: CloudApi,
    zones: TtlCache<(), Vec<HostedZoneInfo>>,
}

/// Lower-case name without the trailing root dot
fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

impl HostedZoneLookup {
    pub fn new(cloud: CloudApi) -> Self {
        Self {
            cloud,
            zones: TtlCache::new(Duration::from_secs(ROUTE53_HOSTED_ZONE_CACHE_TTL_SECS)),
        }
    }

    /// Every hosted zone of the account
    pub async fn hosted_zones(&self) -> Result<Vec<HostedZoneInfo>> {
        if let Some(zones) = self.zones.get(&()) {
            return Ok(zones);
        }
        let zones = self
            .cloud
            .route53("ListHostedZones")
            .list_hosted_zones()
            .await
            .context("Failed to list hosted zones")?;
        self.zones.insert((), zones.clone());
        Ok(zones)
    }

    /// Most specific zone of the given visibility that contains `domain`
    pub async fn zone_for(&self, domain: &str, private_zone: bool) -> Result<Option<HostedZoneInfo>> {
        let domain = normalize(domain);
        Ok(self
            .hosted_zones()
            .await?
            .into_iter()
            .filter(|zone| zone.private_zone == private_zone)
            .filter(|zone| {
                let zone_name = normalize(&zone.name);
                domain == zone_name || domain.ends_with(&format!(".{zone_name}"))
            })
            .max_by_key(|zone| zone.name.len()))
    }

    /// Drop the cached zone list
    pub fn invalidate(&self) {
        self.zones.invalidate(&());
    }
}
