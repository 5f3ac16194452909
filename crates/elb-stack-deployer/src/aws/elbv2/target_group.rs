//! Target group calls

use super::tags::optional_tags;
use super::{CreateTargetGroupInput, Elbv2Client, TargetGroupInfo};
use crate::aws::error::CloudError;
use crate::model::Tags;
use crate::model::elbv2::{Attribute, HealthCheckConfig};
use aws_sdk_elasticloadbalancingv2::types::{
    Matcher, ProtocolEnum, TargetGroup, TargetGroupAttribute, TargetGroupIpAddressTypeEnum,
    TargetTypeEnum,
};

fn target_group_from_sdk(tg: &TargetGroup) -> Option<TargetGroupInfo> {
    Some(TargetGroupInfo {
        arn: tg.target_group_arn()?.to_string(),
        name: tg.target_group_name().unwrap_or_default().to_string(),
        target_type: tg
            .target_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        port: tg.port(),
        protocol: tg.protocol().map(|p| p.as_str().to_string()),
        protocol_version: tg.protocol_version().map(str::to_string),
        ip_address_type: tg.ip_address_type().map(|t| t.as_str().to_string()),
        vpc_id: tg.vpc_id().map(str::to_string),
        health_check: HealthCheckConfig {
            port: tg.health_check_port().map(str::to_string),
            protocol: tg.health_check_protocol().map(|p| p.as_str().to_string()),
            path: tg.health_check_path().map(str::to_string),
            matcher: tg
                .matcher()
                .and_then(|m| m.http_code().or(m.grpc_code()))
                .map(str::to_string),
            interval_seconds: tg.health_check_interval_seconds(),
            timeout_seconds: tg.health_check_timeout_seconds(),
            healthy_threshold_count: tg.healthy_threshold_count(),
            unhealthy_threshold_count: tg.unhealthy_threshold_count(),
        },
        tags: Tags::new(),
    })
}

fn matcher(code: Option<String>) -> Option<Matcher> {
    code.map(|code| Matcher::builder().http_code(code).build())
}

impl Elbv2Client {
    pub async fn describe_target_groups(&self) -> Result<Vec<TargetGroupInfo>, CloudError> {
        let mut target_groups = Vec::new();
        let mut marker = None;
        loop {
            let response = self
                .client
                .describe_target_groups()
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeTargetGroups", e))?;

            target_groups.extend(
                response
                    .target_groups()
                    .iter()
                    .filter_map(target_group_from_sdk),
            );

            marker = response.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }
        Ok(target_groups)
    }

    pub async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> Result<TargetGroupInfo, CloudError> {
        const OPERATION: &str = "CreateTargetGroup";
        let health_check = input.health_check;
        let response = self
            .client
            .create_target_group()
            .name(&input.name)
            .target_type(TargetTypeEnum::from(input.target_type.as_str()))
            .set_port(input.port)
            .set_protocol(input.protocol.as_deref().map(ProtocolEnum::from))
            .set_protocol_version(input.protocol_version)
            .set_ip_address_type(
                input
                    .ip_address_type
                    .as_deref()
                    .map(TargetGroupIpAddressTypeEnum::from),
            )
            .vpc_id(&input.vpc_id)
            .set_health_check_port(health_check.port)
            .set_health_check_protocol(health_check.protocol.as_deref().map(ProtocolEnum::from))
            .set_health_check_path(health_check.path)
            .set_matcher(matcher(health_check.matcher))
            .set_health_check_interval_seconds(health_check.interval_seconds)
            .set_health_check_timeout_seconds(health_check.timeout_seconds)
            .set_healthy_threshold_count(health_check.healthy_threshold_count)
            .set_unhealthy_threshold_count(health_check.unhealthy_threshold_count)
            .set_tags(optional_tags(OPERATION, &input.tags)?)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        let mut info = response
            .target_groups()
            .first()
            .and_then(target_group_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "TargetGroups"))?;
        info.tags = input.tags;
        Ok(info)
    }

    pub async fn modify_target_group(
        &self,
        target_group_arn: &str,
        health_check: HealthCheckConfig,
    ) -> Result<(), CloudError> {
        self.client
            .modify_target_group()
            .target_group_arn(target_group_arn)
            .set_health_check_port(health_check.port)
            .set_health_check_protocol(health_check.protocol.as_deref().map(ProtocolEnum::from))
            .set_health_check_path(health_check.path)
            .set_matcher(matcher(health_check.matcher))
            .set_health_check_interval_seconds(health_check.interval_seconds)
            .set_health_check_timeout_seconds(health_check.timeout_seconds)
            .set_healthy_threshold_count(health_check.healthy_threshold_count)
            .set_unhealthy_threshold_count(health_check.unhealthy_threshold_count)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ModifyTargetGroup", e))?;
        Ok(())
    }

    pub async fn describe_target_group_attributes(
        &self,
        target_group_arn: &str,
    ) -> Result<Vec<Attribute>, CloudError> {
        let response = self
            .client
            .describe_target_group_attributes()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeTargetGroupAttributes", e))?;

        Ok(response
            .attributes()
            .iter()
            .filter_map(|attribute| {
                Some(Attribute::new(
                    attribute.key()?,
                    attribute.value().unwrap_or_default(),
                ))
            })
            .collect())
    }

    pub async fn modify_target_group_attributes(
        &self,
        target_group_arn: &str,
        attributes: Vec<Attribute>,
    ) -> Result<(), CloudError> {
        let attributes = attributes
            .into_iter()
            .map(|attribute| {
                TargetGroupAttribute::builder()
                    .key(attribute.key)
                    .value(attribute.value)
                    .build()
            })
            .collect();
        self.client
            .modify_target_group_attributes()
            .target_group_arn(target_group_arn)
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ModifyTargetGroupAttributes", e))?;
        Ok(())
    }

    pub async fn delete_target_group(&self, target_group_arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_target_group()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteTargetGroup", e))?;
        Ok(())
    }
}
