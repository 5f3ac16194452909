//! Listener calls

use super::tags::optional_tags;
use super::{Elbv2Client, ListenerInfo, ListenerInput, ResolvedAction, WeightedTargetGroup};
use crate::aws::error::CloudError;
use crate::model::elbv2::{FixedResponseActionConfig, RedirectActionConfig};
use aws_sdk_elasticloadbalancingv2::types::{
    self as sdk, ActionTypeEnum, Certificate, ProtocolEnum, RedirectActionStatusCodeEnum,
};

fn action_from_sdk(action: &sdk::Action) -> ResolvedAction {
    let target_groups = match action.forward_config() {
        Some(config) if !config.target_groups().is_empty() => config
            .target_groups()
            .iter()
            .filter_map(|tuple| {
                Some(WeightedTargetGroup {
                    target_group_arn: tuple.target_group_arn()?.to_string(),
                    weight: tuple.weight(),
                })
            })
            .collect(),
        _ => action
            .target_group_arn()
            .map(|arn| WeightedTargetGroup {
                target_group_arn: arn.to_string(),
                weight: None,
            })
            .into_iter()
            .collect(),
    };

    ResolvedAction {
        action_type: action.r#type().as_str().to_string(),
        target_groups,
        fixed_response: action
            .fixed_response_config()
            .map(|config| FixedResponseActionConfig {
                status_code: config.status_code().to_string(),
                content_type: config.content_type().map(str::to_string),
                message_body: config.message_body().map(str::to_string),
            }),
        redirect: action.redirect_config().map(|config| RedirectActionConfig {
            status_code: config.status_code().as_str().to_string(),
            protocol: config.protocol().map(str::to_string),
            port: config.port().map(str::to_string),
            host: config.host().map(str::to_string),
            path: config.path().map(str::to_string),
            query: config.query().map(str::to_string),
        }),
    }
}

fn action_to_sdk(operation: &str, action: &ResolvedAction) -> Result<sdk::Action, CloudError> {
    let build_error = |e: aws_sdk_elasticloadbalancingv2::error::BuildError| {
        CloudError::new(operation, None, e.to_string())
    };

    let forward_config = (!action.target_groups.is_empty()).then(|| {
        sdk::ForwardActionConfig::builder()
            .set_target_groups(Some(
                action
                    .target_groups
                    .iter()
                    .map(|tg| {
                        sdk::TargetGroupTuple::builder()
                            .target_group_arn(&tg.target_group_arn)
                            .set_weight(tg.weight)
                            .build()
                    })
                    .collect(),
            ))
            .build()
    });
    let fixed_response_config = action
        .fixed_response
        .as_ref()
        .map(|config| {
            sdk::FixedResponseActionConfig::builder()
                .status_code(&config.status_code)
                .set_content_type(config.content_type.clone())
                .set_message_body(config.message_body.clone())
                .build()
        })
        .transpose()
        .map_err(build_error)?;
    let redirect_config = action
        .redirect
        .as_ref()
        .map(|config| {
            sdk::RedirectActionConfig::builder()
                .status_code(RedirectActionStatusCodeEnum::from(config.status_code.as_str()))
                .set_protocol(config.protocol.clone())
                .set_port(config.port.clone())
                .set_host(config.host.clone())
                .set_path(config.path.clone())
                .set_query(config.query.clone())
                .build()
        })
        .transpose()
        .map_err(build_error)?;

    sdk::Action::builder()
        .r#type(ActionTypeEnum::from(action.action_type.as_str()))
        .set_forward_config(forward_config)
        .set_fixed_response_config(fixed_response_config)
        .set_redirect_config(redirect_config)
        .build()
        .map_err(build_error)
}

fn listener_from_sdk(listener: &sdk::Listener) -> Option<ListenerInfo> {
    Some(ListenerInfo {
        arn: listener.listener_arn()?.to_string(),
        load_balancer_arn: listener.load_balancer_arn().unwrap_or_default().to_string(),
        port: listener.port()?,
        protocol: listener
            .protocol()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
        default_actions: listener.default_actions().iter().map(action_from_sdk).collect(),
        certificates: listener
            .certificates()
            .iter()
            .filter_map(|cert| cert.certificate_arn().map(str::to_string))
            .collect(),
        ssl_policy: listener.ssl_policy().map(str::to_string),
        alpn_policy: listener.alpn_policy().to_vec(),
    })
}

struct SdkListenerInput {
    actions: Vec<sdk::Action>,
    certificates: Option<Vec<Certificate>>,
    alpn_policy: Option<Vec<String>>,
}

fn listener_input_to_sdk(
    operation: &str,
    input: &ListenerInput,
) -> Result<SdkListenerInput, CloudError> {
    let actions = input
        .default_actions
        .iter()
        .map(|action| action_to_sdk(operation, action))
        .collect::<Result<Vec<_>, _>>()?;
    let certificates = (!input.certificates.is_empty()).then(|| {
        input
            .certificates
            .iter()
            .map(|arn| Certificate::builder().certificate_arn(arn).build())
            .collect()
    });
    let alpn_policy = (!input.alpn_policy.is_empty()).then(|| input.alpn_policy.clone());
    Ok(SdkListenerInput {
        actions,
        certificates,
        alpn_policy,
    })
}

impl Elbv2Client {
    pub async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
    ) -> Result<Vec<ListenerInfo>, CloudError> {
        let mut listeners = Vec::new();
        let mut marker = None;
        loop {
            let response = self
                .client
                .describe_listeners()
                .load_balancer_arn(load_balancer_arn)
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeListeners", e))?;

            listeners.extend(response.listeners().iter().filter_map(listener_from_sdk));

            marker = response.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }
        Ok(listeners)
    }

    pub async fn create_listener(
        &self,
        load_balancer_arn: &str,
        input: ListenerInput,
    ) -> Result<ListenerInfo, CloudError> {
        const OPERATION: &str = "CreateListener";
        let sdk_input = listener_input_to_sdk(OPERATION, &input)?;
        let response = self
            .client
            .create_listener()
            .load_balancer_arn(load_balancer_arn)
            .port(input.port)
            .protocol(ProtocolEnum::from(input.protocol.as_str()))
            .set_default_actions(Some(sdk_input.actions))
            .set_certificates(sdk_input.certificates)
            .set_ssl_policy(input.ssl_policy.clone())
            .set_alpn_policy(sdk_input.alpn_policy)
            .set_tags(optional_tags(OPERATION, &input.tags)?)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        response
            .listeners()
            .first()
            .and_then(listener_from_sdk)
            .ok_or_else(|| CloudError::missing_field(OPERATION, "Listeners"))
    }

    pub async fn modify_listener(
        &self,
        listener_arn: &str,
        input: ListenerInput,
    ) -> Result<(), CloudError> {
        const OPERATION: &str = "ModifyListener";
        let sdk_input = listener_input_to_sdk(OPERATION, &input)?;
        self.client
            .modify_listener()
            .listener_arn(listener_arn)
            .port(input.port)
            .protocol(ProtocolEnum::from(input.protocol.as_str()))
            .set_default_actions(Some(sdk_input.actions))
            .set_certificates(sdk_input.certificates)
            .set_ssl_policy(input.ssl_policy)
            .set_alpn_policy(sdk_input.alpn_policy)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;
        Ok(())
    }

    pub async fn delete_listener(&self, listener_arn: &str) -> Result<(), CloudError> {
        self.client
            .delete_listener()
            .listener_arn(listener_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DeleteListener", e))?;
        Ok(())
    }
}
