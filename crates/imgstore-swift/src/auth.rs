//! Keystone authentication.

use imgstore_core::{StorageError, StorageResult};
use serde::Deserialize;
use serde_json::json;

use crate::config::SwiftConfig;

/// Catalog entry type of the object storage service.
const OBJECT_STORE: &str = "object-store";

/// An authenticated session: where objects live and the token to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    /// Account URL objects are read from.
    pub storage_url: String,
    /// Value of `X-Auth-Token`.
    pub token: String,
}

/// Authenticate with the configured (or detected) Keystone version.
pub(crate) async fn authenticate(
    http: &reqwest::Client,
    config: &SwiftConfig,
) -> StorageResult<Session> {
    match config.resolved_auth_version() {
        1 => authenticate_v1(http, config).await,
        2 => authenticate_v2(http, config).await,
        _ => authenticate_v3(http, config).await,
    }
}

async fn authenticate_v1(http: &reqwest::Client, config: &SwiftConfig) -> StorageResult<Session> {
    let response = http
        .get(&config.auth_url)
        .header("X-Auth-User", &config.username)
        .header("X-Auth-Key", &config.api_key)
        .send()
        .await
        .map_err(auth_error)?
        .error_for_status()
        .map_err(auth_error)?;

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| auth_error(format!("response has no {name} header")))
    };

    Ok(Session {
        storage_url: header("X-Storage-Url")?,
        token: header("X-Auth-Token")?,
    })
}

async fn authenticate_v2(http: &reqwest::Client, config: &SwiftConfig) -> StorageResult<Session> {
    let url = format!("{}/tokens", config.auth_url.trim_end_matches('/'));
    let body = json!({
        "auth": {
            "passwordCredentials": {
                "username": config.username,
                "password": config.api_key,
            },
            "tenantName": config.tenant,
        }
    });

    let response: V2Response = http
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(auth_error)?
        .error_for_status()
        .map_err(auth_error)?
        .json()
        .await
        .map_err(auth_error)?;

    v2_session(response)
}

async fn authenticate_v3(http: &reqwest::Client, config: &SwiftConfig) -> StorageResult<Session> {
    let url = format!("{}/auth/tokens", config.auth_url.trim_end_matches('/'));
    let mut body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": config.username,
                        "password": config.api_key,
                        "domain": { "name": config.domain },
                    }
                }
            }
        }
    });
    if !config.tenant.is_empty() {
        body["auth"]["scope"] = json!({
            "project": {
                "name": config.tenant,
                "domain": { "name": config.domain },
            }
        });
    }

    let response = http
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(auth_error)?
        .error_for_status()
        .map_err(auth_error)?;

    let token = response
        .headers()
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or_else(|| auth_error("response has no X-Subject-Token header"))?;
    let body: V3Response = response.json().await.map_err(auth_error)?;

    Ok(Session {
        storage_url: v3_storage_url(&body)
            .ok_or_else(|| auth_error("no public object-store endpoint in catalog"))?,
        token,
    })
}

fn auth_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> StorageError {
    let err = err.into();
    StorageError::backend("Swift", format!("authentication failed: {err}"))
}

// ---------------------------------------------------------------------------
// Keystone v2
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct V2Response {
    access: V2Access,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V2Access {
    token: V2Token,
    #[serde(default)]
    service_catalog: Vec<V2Service>,
}

#[derive(Debug, Deserialize)]
struct V2Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct V2Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V2Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V2Endpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

fn v2_session(response: V2Response) -> StorageResult<Session> {
    let storage_url = response
        .access
        .service_catalog
        .into_iter()
        .find(|s| s.kind == OBJECT_STORE)
        .and_then(|s| s.endpoints.into_iter().next())
        .map(|e| e.public_url)
        .ok_or_else(|| auth_error("no object-store endpoint in catalog"))?;

    Ok(Session {
        storage_url,
        token: response.access.token.id,
    })
}

// ---------------------------------------------------------------------------
// Keystone v3
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct V3Response {
    token: V3Token,
}

#[derive(Debug, Deserialize)]
struct V3Token {
    #[serde(default)]
    catalog: Vec<V3Service>,
}

#[derive(Debug, Deserialize)]
struct V3Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V3Endpoint>,
}

#[derive(Debug, Deserialize)]
struct V3Endpoint {
    interface: String,
    url: String,
}

fn v3_storage_url(response: &V3Response) -> Option<String> {
    response
        .token
        .catalog
        .iter()
        .filter(|s| s.kind == OBJECT_STORE)
        .flat_map(|s| &s.endpoints)
        .find(|e| e.interface == "public")
        .map(|e| e.url.clone())
}
