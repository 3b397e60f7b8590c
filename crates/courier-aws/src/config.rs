//! Connection settings shared by the SQS and SNS transports.

use crate::error::AwsError;
use crate::signer::Credentials;
use courier_core::config::MAX_WAIT_TIME_SECONDS;
use serde::{Deserialize, Serialize};
use std::fmt;

const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

fn default_request_timeout_seconds() -> u64 {
    30
}

/// AWS connection configuration.
///
/// Credentials left unset here are read from `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN` when a transport is built.
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsTransportConfig {
    /// AWS region, e.g. `eu-west-1`
    pub region: String,

    /// Endpoint override for local emulators; defaults to the regional
    /// service endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub session_token: Option<String>,

    /// HTTP timeout per request; must exceed the longest long-poll wait
    /// (20 seconds) so a receive is never cut off while messages are returned
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl AwsTransportConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    /// Endpoint for `service`, honouring the override.
    pub fn endpoint_for(&self, service: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}.amazonaws.com", service, self.region),
        }
    }

    /// Resolve credentials from this configuration, falling back to the
    /// standard environment variables.
    pub fn resolve_credentials(&self) -> Result<Credentials, AwsError> {
        let access_key_id = self
            .access_key_id
            .clone()
            .or_else(|| non_empty_var(ACCESS_KEY_ID_VAR));
        let secret_access_key = self
            .secret_access_key
            .clone()
            .or_else(|| non_empty_var(SECRET_ACCESS_KEY_VAR));

        let (Some(access_key_id), Some(secret_access_key)) = (access_key_id, secret_access_key)
        else {
            return Err(AwsError::ConfigurationError(format!(
                "No AWS credentials configured and {} / {} are not set",
                ACCESS_KEY_ID_VAR, SECRET_ACCESS_KEY_VAR
            )));
        };

        let credentials = Credentials::new(access_key_id, secret_access_key);
        let session_token = self
            .session_token
            .clone()
            .or_else(|| non_empty_var(SESSION_TOKEN_VAR));

        Ok(match session_token {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }

    /// Check required fields and the request timeout.
    pub fn validate(&self) -> Result<(), AwsError> {
        if self.region.trim().is_empty() {
            return Err(AwsError::ConfigurationError(
                "Region cannot be empty".to_string(),
            ));
        }

        if self.request_timeout_seconds <= u64::from(MAX_WAIT_TIME_SECONDS) {
            return Err(AwsError::ConfigurationError(format!(
                "Request timeout must exceed the {}s long-poll wait, got {}s",
                MAX_WAIT_TIME_SECONDS, self.request_timeout_seconds
            )));
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                AwsError::ConfigurationError(format!("Invalid endpoint '{}': {}", endpoint, e))
            })?;
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl fmt::Debug for AwsTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsTransportConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
