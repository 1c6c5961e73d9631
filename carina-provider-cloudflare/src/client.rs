//! Cloudflare API client
//!
//! Thin wrapper over the v4 REST API covering the Access CA certificate
//! endpoints at account and zone level.

use std::fmt;
use std::time::Duration;

use carina_core::provider::BoxFuture;
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, Credentials, ProviderConfig};
use crate::identifier::IdentifierType;

/// Short-lived certificate CA bound to an Access application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCaCertificate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub aud: String,
    #[serde(default)]
    pub public_key: String,
}

/// Error or message entry of an API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ResponseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

fn join_errors(errors: &[ResponseInfo]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ResponseInfo::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {}", join_errors(.errors))]
    NotFound { errors: Vec<ResponseInfo> },

    #[error("HTTP status {status}: {}", join_errors(.errors))]
    Api {
        status: u16,
        errors: Vec<ResponseInfo>,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response (HTTP status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("response did not include a result")]
    MissingResult,

    #[error("missing {0}")]
    MissingIdentifier(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Standard v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ResponseInfo>,
    result: Option<T>,
}

/// Access CA certificate operations, one member per scope kind
pub trait AccessCaCertificateApi: Send + Sync {
    fn create_access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>>;

    fn create_zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>>;

    fn access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>>;

    fn zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>>;

    fn delete_access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>>;

    fn delete_zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>>;
}

/// HTTP client for the Cloudflare v4 API
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
}

impl CloudflareClient {
    pub fn new(config: &ProviderConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match config.credentials()? {
            Credentials::Token(token) => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token))?,
                );
            }
            Credentials::Key { key, email } => {
                headers.insert("x-auth-key", HeaderValue::from_str(key)?);
                headers.insert("x-auth-email", HeaderValue::from_str(email)?);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn ca_url(&self, kind: IdentifierType, container_id: &str, application_id: &str) -> String {
        format!(
            "{}/{}/{}/access/apps/{}/ca",
            self.base_url,
            kind.route_prefix(),
            container_id,
            application_id
        )
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, method: Method, url: String) -> ApiResult<Option<T>> {
        debug!("{} {}", method, url);
        let response = self.http.request(method, &url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                errors: error_infos(&body),
            });
        }
        if !status.is_success() {
            return Err(api_error(status, error_infos(&body)));
        }

        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
                status: status.as_u16(),
                source,
            })?;
        if !envelope.success {
            return Err(api_error(status, envelope.errors));
        }
        Ok(envelope.result)
    }

    async fn create_ca(
        &self,
        kind: IdentifierType,
        container_id: &str,
        application_id: &str,
    ) -> ApiResult<AccessCaCertificate> {
        check_ids(kind, container_id, application_id)?;
        let url = self.ca_url(kind, container_id, application_id);
        self.send(Method::POST, url)
            .await?
            .ok_or(ApiError::MissingResult)
    }

    async fn get_ca(
        &self,
        kind: IdentifierType,
        container_id: &str,
        application_id: &str,
    ) -> ApiResult<AccessCaCertificate> {
        check_ids(kind, container_id, application_id)?;
        let url = self.ca_url(kind, container_id, application_id);
        self.send(Method::GET, url)
            .await?
            .ok_or(ApiError::MissingResult)
    }

    async fn delete_ca(
        &self,
        kind: IdentifierType,
        container_id: &str,
        application_id: &str,
    ) -> ApiResult<()> {
        check_ids(kind, container_id, application_id)?;
        let url = self.ca_url(kind, container_id, application_id);
        self.send::<serde_json::Value>(Method::DELETE, url).await?;
        Ok(())
    }
}

fn check_ids(kind: IdentifierType, container_id: &str, application_id: &str) -> ApiResult<()> {
    if container_id.is_empty() {
        return Err(ApiError::MissingIdentifier(match kind {
            IdentifierType::Account => "account ID",
            IdentifierType::Zone => "zone ID",
        }));
    }
    if application_id.is_empty() {
        return Err(ApiError::MissingIdentifier("application ID"));
    }
    Ok(())
}

/// Classify a failed response. Error code 404 or "not found" text counts as not found.
fn api_error(status: StatusCode, errors: Vec<ResponseInfo>) -> ApiError {
    let not_found = errors
        .iter()
        .any(|e| e.code == 404 || e.message.to_lowercase().contains("not found"));
    if not_found {
        ApiError::NotFound { errors }
    } else {
        ApiError::Api {
            status: status.as_u16(),
            errors,
        }
    }
}

/// Best-effort extraction of the `errors` array from an error body
fn error_infos(body: &[u8]) -> Vec<ResponseInfo> {
    serde_json::from_slice::<Envelope<serde_json::Value>>(body)
        .map(|e| e.errors)
        .unwrap_or_default()
}

impl AccessCaCertificateApi for CloudflareClient {
    fn create_access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>> {
        Box::pin(self.create_ca(IdentifierType::Account, account_id, application_id))
    }

    fn create_zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>> {
        Box::pin(self.create_ca(IdentifierType::Zone, zone_id, application_id))
    }

    fn access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>> {
        Box::pin(self.get_ca(IdentifierType::Account, account_id, application_id))
    }

    fn zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<AccessCaCertificate>> {
        Box::pin(self.get_ca(IdentifierType::Zone, zone_id, application_id))
    }

    fn delete_access_ca_certificate<'a>(
        &'a self,
        account_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(self.delete_ca(IdentifierType::Account, account_id, application_id))
    }

    fn delete_zone_level_access_ca_certificate<'a>(
        &'a self,
        zone_id: &'a str,
        application_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(self.delete_ca(IdentifierType::Zone, zone_id, application_id))
    }
}
