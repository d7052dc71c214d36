//! Host inventory endpoints

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use fleetops_core::{Host, HostAuth, HostSummary, RecordStore};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::response::{ok, ApiError, ApiResult};

/// Request to register a host.
///
/// Exactly one of `password` and `key_path` must be given.
#[derive(Debug, Deserialize)]
pub struct CreateHostRequest {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateHostRequest {
    pub fn into_host(self) -> Result<Host, ApiError> {
        for (field, value) in [
            ("name", &self.name),
            ("address", &self.address),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::bad_request(format!("{} must not be empty", field)));
            }
        }

        let auth = match (self.password, self.key_path) {
            (Some(password), None) => HostAuth::password(password),
            (None, Some(key_path)) => HostAuth::PrivateKey {
                key_path,
                passphrase: self.passphrase.map(SecretString::from),
            },
            _ => {
                return Err(ApiError::bad_request(
                    "exactly one of password and key_path is required",
                ))
            }
        };

        let mut host = Host::new(self.name, self.address, self.username, auth).with_tags(self.tags);
        if let Some(port) = self.port {
            host = host.with_port(port);
        }
        Ok(host)
    }
}

async fn create_host(
    Extension(store): Extension<Arc<dyn RecordStore>>,
    Json(request): Json<CreateHostRequest>,
) -> ApiResult<HostSummary> {
    let host = request.into_host()?;
    store.create_host(&host).await?;
    info!(host_id = %host.id, address = %host.address, "Host registered");
    ok(HostSummary::from(&host))
}

async fn list_hosts(
    Extension(store): Extension<Arc<dyn RecordStore>>,
) -> ApiResult<Vec<HostSummary>> {
    let hosts = store.list_hosts().await?;
    ok(hosts.iter().map(HostSummary::from).collect())
}

async fn get_host(
    Extension(store): Extension<Arc<dyn RecordStore>>,
    Path(id): Path<Uuid>,
) -> ApiResult<HostSummary> {
    let host = store.get_host(id).await?;
    ok(HostSummary::from(&host))
}

/// Host routes
pub fn hosts_routes() -> Router {
    Router::new()
        .route("/api/v1/hosts", get(list_hosts).post(create_host))
        .route("/api/v1/hosts/:id", get(get_host))
}
