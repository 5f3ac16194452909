//! Route53 capability: hosted zone listing

use crate::aws::context::AwsContext;
use crate::aws::error::CloudError;
use async_trait::async_trait;
use aws_sdk_route53::Client;

/// Observed hosted zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZoneInfo {
    /// Zone ID without the `/hostedzone/` prefix
    pub id: String,
    /// Fully qualified name, with its trailing dot
    pub name: String,
    pub private_zone: bool,
}

/// Route53 operations used by the hosted zone lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Route53Api: Send + Sync {
    /// Every hosted zone of the account
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZoneInfo>, CloudError>;
}

/// SDK-backed Route53 client
pub struct Route53Client {
    client: Client,
}

impl Route53Client {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.route53_client(),
        }
    }
}

#[async_trait]
impl Route53Api for Route53Client {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZoneInfo>, CloudError> {
        let mut zones = Vec::new();
        let mut marker = None;
        loop {
            let response = self
                .client
                .list_hosted_zones()
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("ListHostedZones", e))?;

            zones.extend(response.hosted_zones().iter().map(|zone| HostedZoneInfo {
                id: zone.id().trim_start_matches("/hostedzone/").to_string(),
                name: zone.name().to_string(),
                private_zone: zone.config().is_some_and(|config| config.private_zone()),
            }));

            marker = response
                .is_truncated()
                .then(|| response.next_marker().map(str::to_string))
                .flatten();
            if marker.is_none() {
                break;
            }
        }
        Ok(zones)
    }
}
