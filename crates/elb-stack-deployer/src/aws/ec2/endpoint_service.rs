//! VPC endpoint service calls

use super::tags::{filters_to_sdk, tag_specification, tags_from_sdk};
use super::{
    CreateEndpointServiceInput, Ec2Client, Ec2Filter, EndpointServiceInfo,
    ModifyEndpointServiceInput,
};
use crate::aws::error::CloudError;
use aws_sdk_ec2::types::{ResourceType, ServiceConfiguration};

fn service_from_sdk(config: &ServiceConfiguration) -> Option<EndpointServiceInfo> {
    Some(EndpointServiceInfo {
        service_id: config.service_id()?.to_string(),
        acceptance_required: config.acceptance_required().unwrap_or(false),
        network_load_balancer_arns: config.network_load_balancer_arns().to_vec(),
        private_dns_name: config.private_dns_name().map(str::to_string),
        tags: tags_from_sdk(config.tags()),
    })
}

/// Turn an empty list into an absent parameter
fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

impl Ec2Client {
    pub async fn describe_endpoint_services(
        &self,
        filters: Vec<Ec2Filter>,
    ) -> Result<Vec<EndpointServiceInfo>, CloudError> {
        let filters = filters_to_sdk(filters);
        let mut services = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .describe_vpc_endpoint_service_configurations()
                .set_filters(filters.clone())
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeVpcEndpointServiceConfigurations", e))?;

            services.extend(response.service_configurations().iter().filter_map(service_from_sdk));

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(services)
    }

    pub async fn create_endpoint_service(
        &self,
        input: CreateEndpointServiceInput,
    ) -> Result<EndpointServiceInfo, CloudError> {
        const OPERATION: &str = "CreateVpcEndpointServiceConfiguration";
        let response = self
            .client
            .create_vpc_endpoint_service_configuration()
            .acceptance_required(input.acceptance_required)
            .set_network_load_balancer_arns(Some(input.network_load_balancer_arns.clone()))
            .set_private_dns_name(input.private_dns_name.clone())
            .tag_specifications(tag_specification(ResourceType::VpcEndpointService, &input.tags))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        response
            .service_configuration()
            .and_then(service_from_sdk)
            .map(|mut service| {
                if service.tags.is_empty() {
                    service.tags = input.tags;
                }
                service
            })
            .ok_or_else(|| CloudError::missing_field(OPERATION, "ServiceConfiguration"))
    }

    pub async fn modify_endpoint_service(
        &self,
        input: ModifyEndpointServiceInput,
    ) -> Result<(), CloudError> {
        self.client
            .modify_vpc_endpoint_service_configuration()
            .service_id(&input.service_id)
            .set_acceptance_required(input.acceptance_required)
            .set_add_network_load_balancer_arns(non_empty(input.add_network_load_balancer_arns))
            .set_remove_network_load_balancer_arns(non_empty(
                input.remove_network_load_balancer_arns,
            ))
            .set_private_dns_name(input.private_dns_name)
            .set_remove_private_dns_name(input.remove_private_dns_name.then_some(true))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ModifyVpcEndpointServiceConfiguration", e))?;
        Ok(())
    }

    pub async fn delete_endpoint_service(&self, service_id: &str) -> Result<(), CloudError> {
        const OPERATION: &str = "DeleteVpcEndpointServiceConfigurations";
        let response = self
            .client
            .delete_vpc_endpoint_service_configurations()
            .service_ids(service_id)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk(OPERATION, e))?;

        // Per-item failures come back in a successful response
        if let Some(error) = response.unsuccessful().iter().find_map(|item| item.error()) {
            return Err(CloudError::new(
                OPERATION,
                error.code(),
                error.message().unwrap_or("unsuccessful"),
            ));
        }
        Ok(())
    }

    pub async fn describe_endpoint_service_permissions(
        &self,
        service_id: &str,
    ) -> Result<Vec<String>, CloudError> {
        let mut principals = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .describe_vpc_endpoint_service_permissions()
                .service_id(service_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("DescribeVpcEndpointServicePermissions", e))?;

            principals.extend(
                response
                    .allowed_principals()
                    .iter()
                    .filter_map(|principal| principal.principal().map(str::to_string)),
            );

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(principals)
    }

    pub async fn modify_endpoint_service_permissions(
        &self,
        service_id: &str,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> Result<(), CloudError> {
        self.client
            .modify_vpc_endpoint_service_permissions()
            .service_id(service_id)
            .set_add_allowed_principals(non_empty(add))
            .set_remove_allowed_principals(non_empty(remove))
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("ModifyVpcEndpointServicePermissions", e))?;
        Ok(())
    }
}
