//! ACM capability: certificate listing and details

use crate::aws::context::AwsContext;
use crate::aws::error::{CloudError, ignore_not_found};
use async_trait::async_trait;
use aws_sdk_acm::Client;

/// Certificate as listed by ACM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummaryInfo {
    pub arn: String,
    pub domain_name: Option<String>,
}

/// Certificate details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub arn: String,
    pub domain_name: Option<String>,
    pub subject_alternative_names: Vec<String>,
    /// e.g. `ISSUED`, `PENDING_VALIDATION`
    pub status: Option<String>,
    /// ARNs of the resources using the certificate
    pub in_use_by: Vec<String>,
}

/// ACM operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcmApi: Send + Sync {
    /// Every certificate of the region
    async fn list_certificates(&self) -> Result<Vec<CertificateSummaryInfo>, CloudError>;

    /// Certificate details, `None` once it is deleted
    async fn describe_certificate(
        &self,
        certificate_arn: &str,
    ) -> Result<Option<CertificateInfo>, CloudError>;
}

/// SDK-backed ACM client
pub struct AcmClient {
    client: Client,
}

impl AcmClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.acm_client(),
        }
    }
}

#[async_trait]
impl AcmApi for AcmClient {
    async fn list_certificates(&self) -> Result<Vec<CertificateSummaryInfo>, CloudError> {
        let mut certificates = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_certificates()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| CloudError::from_sdk("ListCertificates", e))?;

            certificates.extend(response.certificate_summary_list().iter().filter_map(
                |summary| {
                    Some(CertificateSummaryInfo {
                        arn: summary.certificate_arn()?.to_string(),
                        domain_name: summary.domain_name().map(str::to_string),
                    })
                },
            ));

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(certificates)
    }

    async fn describe_certificate(
        &self,
        certificate_arn: &str,
    ) -> Result<Option<CertificateInfo>, CloudError> {
        let result = self
            .client
            .describe_certificate()
            .certificate_arn(certificate_arn)
            .send()
            .await
            .map_err(|e| CloudError::from_sdk("DescribeCertificate", e));

        Ok(ignore_not_found(result)?.and_then(|response| {
            let certificate = response.certificate()?;
            Some(CertificateInfo {
                arn: certificate.certificate_arn()?.to_string(),
                domain_name: certificate.domain_name().map(str::to_string),
                subject_alternative_names: certificate.subject_alternative_names().to_vec(),
                status: certificate.status().map(|status| status.as_str().to_string()),
                in_use_by: certificate.in_use_by().to_vec(),
            })
        }))
    }
}
