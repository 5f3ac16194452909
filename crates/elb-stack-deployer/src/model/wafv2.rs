//! WAFv2 web ACL associations

use super::core::{ModelResource, ResourceSpec, StringToken};
use elb_stack_common::resource_kind::TYPE_WEB_ACL_ASSOCIATION;
use serde::Serialize;

/// Desired web ACL for one load balancer; `None` removes any association
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAclAssociationSpec {
    #[serde(rename = "webACLARN", skip_serializing_if = "Option::is_none")]
    pub web_acl_arn: Option<String>,
    #[serde(rename = "resourceARN")]
    pub resource_arn: StringToken,
}

impl ResourceSpec for WebAclAssociationSpec {
    const TYPE: &'static str = TYPE_WEB_ACL_ASSOCIATION;
    type Status = ();

    fn tokens(&self) -> Vec<&StringToken> {
        vec![&self.resource_arn]
    }
}

pub type WebAclAssociation = ModelResource<WebAclAssociationSpec>;
