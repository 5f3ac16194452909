//! Deployer configuration loaded from JSON

use anyhow::{Context, Result};
use elb_stack_common::defaults::{
    default_legacy_tag_prefix, default_retry_interval_secs, default_retry_timeout_secs,
    default_tag_prefix, enabled,
};
use elb_stack_common::tags::{LEGACY_CLUSTER_TAG_PREFIX, TAG_SUFFIX_CLUSTER, TAG_SUFFIX_RESOURCE, TAG_SUFFIX_STACK, tag_key};
use garde::Validate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::wait::RetryPolicy;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    /// Default tags may not overwrite the ownership tags
    #[error("default tag key '{0}' is reserved for resource tracking")]
    ReservedTagKey(String),

    #[error("retry timeout ({timeout_secs}s) is shorter than the retry interval ({interval_secs}s)")]
    RetryBudget { interval_secs: u64, timeout_secs: u64 },
}

/// Poll settings for deletes blocked by dependent resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_retry_interval_secs")]
    #[garde(range(min = 1))]
    pub interval_secs: u64,

    #[serde(default = "default_retry_timeout_secs")]
    #[garde(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_retry_interval_secs(),
            timeout_secs: default_retry_timeout_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.interval_secs, self.timeout_secs)
    }
}

/// Optional resource kinds; a disabled kind is neither created nor deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub shield: bool,
    #[serde(default = "enabled")]
    pub wafv2: bool,
    #[serde(default = "enabled")]
    pub global_accelerator: bool,
    /// Discover ELBv2 resources through the Resource Groups Tagging API
    /// instead of describing every resource's tags
    #[serde(default)]
    pub resource_groups_tagging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            shield: true,
            wafv2: true,
            global_accelerator: true,
            resource_groups_tagging: false,
        }
    }
}

/// Deployer configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DeployerConfig {
    /// Name of the owning cluster, recorded in ownership tags
    #[garde(length(min = 1))]
    pub cluster_name: String,

    /// AWS region of the cluster
    #[garde(length(min = 1))]
    pub region: String,

    /// VPC that security groups and target groups are created in
    #[garde(length(min = 1))]
    pub vpc_id: String,

    #[serde(default = "default_tag_prefix")]
    #[garde(length(min = 1))]
    pub tag_prefix: String,

    #[serde(default = "default_legacy_tag_prefix")]
    #[garde(length(min = 1))]
    pub legacy_tag_prefix: String,

    /// Tags applied to every resource
    #[serde(default)]
    #[garde(skip)]
    pub default_tags: BTreeMap<String, String>,

    /// Tag keys owned by other systems; never added or removed
    #[serde(default)]
    #[garde(skip)]
    pub external_managed_tags: Vec<String>,

    /// Service key to endpoint URL overrides
    #[serde(default)]
    #[garde(skip)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default)]
    #[garde(dive)]
    pub retry: RetryConfig,

    #[serde(default)]
    #[garde(skip)]
    pub features: FeatureFlags,
}

impl DeployerConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .check()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Field validation plus the cross-field rules
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if self.retry.timeout_secs < self.retry.interval_secs {
            return Err(ConfigError::RetryBudget {
                interval_secs: self.retry.interval_secs,
                timeout_secs: self.retry.timeout_secs,
            });
        }

        let reserved: Vec<String> = [TAG_SUFFIX_CLUSTER, TAG_SUFFIX_STACK, TAG_SUFFIX_RESOURCE]
            .iter()
            .flat_map(|suffix| {
                [
                    tag_key(&self.tag_prefix, suffix),
                    tag_key(&self.legacy_tag_prefix, suffix),
                ]
            })
            .collect();
        if let Some(key) = self.default_tags.keys().find(|key| {
            reserved.contains(key) || key.starts_with(LEGACY_CLUSTER_TAG_PREFIX)
        }) {
            return Err(ConfigError::ReservedTagKey(key.clone()));
        }
        Ok(())
    }
}
