use chrono::{DateTime, Utc};
use fleetops_ssh::{ConnectionParams, Credential};
use secrecy::SecretString;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// Default SSH port
const DEFAULT_SSH_PORT: u16 = 22;

/// Stored authentication material for a host.
#[derive(Debug, Clone)]
pub enum HostAuth {
    /// Password authentication
    Password(SecretString),
    /// Key file on the machine running fleetops
    PrivateKey {
        /// Path to the private key
        key_path: String,
        /// Passphrase for an encrypted key
        passphrase: Option<SecretString>,
    },
}

impl HostAuth {
    /// Password auth from a plain string
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(SecretString::from(password.into()))
    }

    /// Stable label used in storage and API views
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKey { .. } => "private_key",
        }
    }
}

/// A machine that tasks and terminals can target.
#[derive(Debug, Clone)]
pub struct Host {
    /// Unique host ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Hostname or IP address
    pub address: String,
    /// SSH port
    pub port: u16,
    /// Login name
    pub username: String,
    /// Authentication material
    pub auth: HostAuth,
    /// Free-form labels
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Host {
    /// Create a host on the default SSH port
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
        auth: HostAuth,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            auth,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Parameters for opening an SSH connection to this host
    #[must_use]
    pub fn connection_params(&self) -> ConnectionParams {
        let credential = match &self.auth {
            HostAuth::Password(password) => Credential::Password(password.clone()),
            HostAuth::PrivateKey {
                key_path,
                passphrase,
            } => Credential::PrivateKey {
                path: PathBuf::from(key_path),
                passphrase: passphrase.clone(),
            },
        };
        ConnectionParams::new(
            self.address.clone(),
            self.port,
            self.username.clone(),
            credential,
        )
    }
}

/// Host view without secrets.
#[derive(Debug, Clone, Serialize)]
pub struct HostSummary {
    /// Host ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Hostname or IP address
    pub address: String,
    /// SSH port
    pub port: u16,
    /// Login name
    pub username: String,
    /// `password` or `private_key`
    pub auth_type: &'static str,
    /// Labels
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<&Host> for HostSummary {
    fn from(host: &Host) -> Self {
        Self {
            id: host.id,
            name: host.name.clone(),
            address: host.address.clone(),
            port: host.port,
            username: host.username.clone(),
            auth_type: host.auth.kind(),
            tags: host.tags.clone(),
            created_at: host.created_at,
        }
    }
}
