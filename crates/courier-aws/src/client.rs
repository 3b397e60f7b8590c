//! Signed AWS query-protocol calls over HTTP.

use crate::config::AwsTransportConfig;
use crate::error::{parse_error_response, AwsError};
use crate::signer::AwsV4Signer;
use chrono::Utc;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// HTTP client bound to one AWS service endpoint.
pub(crate) struct AwsClient {
    http_client: HttpClient,
    signer: AwsV4Signer,
    service: &'static str,
    version: &'static str,
    endpoint: Url,
    host: String,
}

impl AwsClient {
    pub(crate) fn new(
        config: &AwsTransportConfig,
        service: &'static str,
        version: &'static str,
    ) -> Result<Self, AwsError> {
        config.validate()?;
        let credentials = config.resolve_credentials()?;

        let endpoint_str = config.endpoint_for(service);
        let endpoint = Url::parse(&endpoint_str).map_err(|e| {
            AwsError::ConfigurationError(format!("Invalid endpoint '{}': {}", endpoint_str, e))
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(AwsError::ConfigurationError(format!(
                    "Endpoint '{}' has no host",
                    endpoint_str
                )))
            }
        };

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AwsError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer: AwsV4Signer::new(credentials, config.region.clone(), service),
            service,
            version,
            endpoint,
            host,
        })
    }

    pub(crate) fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke `action` with `params` and return the raw XML response.
    pub(crate) async fn call(
        &self,
        action: &str,
        params: &[(String, String)],
    ) -> Result<String, AwsError> {
        let body = form_encode(
            [("Action", action), ("Version", self.version)]
                .into_iter()
                .chain(params.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        );

        let headers = self.signer.sign_request(
            "POST",
            &self.host,
            self.endpoint.path(),
            Some(FORM_CONTENT_TYPE),
            &body,
            &Utc::now(),
        );

        let mut request = self.http_client.post(self.endpoint.clone());
        for (name, value) in headers {
            // reqwest derives Host from the URL
            if name != "host" {
                request = request.header(name, value);
            }
        }

        debug!(service = self.service, action = action, "Calling AWS");

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::Timeout(format!("{} {}: {}", self.service, action, e))
            } else if e.is_connect() {
                AwsError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AwsError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let error = parse_error_response(self.service, &response_body, status.as_u16());
            debug!(
                service = self.service,
                action = action,
                status = status.as_u16(),
                error = %error,
                "AWS call failed"
            );
            return Err(error);
        }

        Ok(response_body)
    }
}

/// Encode pairs as `application/x-www-form-urlencoded` using RFC 3986
/// unreserved characters, as AWS signing expects.
pub(crate) fn form_encode<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
