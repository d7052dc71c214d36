//! CLI command: `fleetops host`

use clap::{Args, Subcommand};
use fleetops_core::{Host, HostAuth};
use secrecy::SecretString;
use tracing::warn;

use crate::server::config::AppConfig;
use crate::server::AppContext;

#[derive(Subcommand, Debug)]
pub enum HostCommand {
    /// Register a host
    Add(AddHostArgs),
    /// List registered hosts
    List,
}

#[derive(Args, Debug)]
pub struct AddHostArgs {
    /// Display name
    pub name: String,
    /// Hostname or IP address
    pub address: String,
    /// SSH port
    #[arg(short, long, default_value_t = 22)]
    pub port: u16,
    /// Login name
    #[arg(short, long)]
    pub user: String,
    /// Password authentication
    #[arg(long, conflicts_with = "key", required_unless_present = "key")]
    pub password: Option<String>,
    /// Private key file
    #[arg(long)]
    pub key: Option<String>,
    /// Passphrase of the private key
    #[arg(long, requires = "key")]
    pub passphrase: Option<String>,
    /// Label (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

impl AddHostArgs {
    fn into_host(self) -> Host {
        let auth = match (self.password, self.key) {
            (Some(password), _) => HostAuth::password(password),
            (None, key) => HostAuth::PrivateKey {
                key_path: key.unwrap_or_default(),
                passphrase: self.passphrase.map(SecretString::from),
            },
        };
        Host::new(self.name, self.address, self.user, auth)
            .with_port(self.port)
            .with_tags(self.tags)
    }
}

/// Run the host subcommand.
pub async fn run(command: HostCommand, config: AppConfig) -> anyhow::Result<()> {
    if config.database.in_memory {
        warn!("database.in_memory is set; hosts will not outlive this process");
    }
    let ctx = AppContext::from_config(&config).await?;

    match command {
        HostCommand::Add(args) => {
            let host = args.into_host();
            ctx.store.create_host(&host).await?;
            println!("Registered {} ({}@{}:{})", host.name, host.username, host.address, host.port);
            println!("  id: {}", host.id);
        }
        HostCommand::List => {
            let hosts = ctx.store.list_hosts().await?;
            println!();
            println!(
                "  {:<38} {:<16} {:<28} {:<12} Tags",
                "ID", "Name", "Endpoint", "Auth"
            );
            println!("  {}", "-".repeat(104));
            if hosts.is_empty() {
                println!("  (no hosts registered)");
            }
            for host in &hosts {
                println!(
                    "  {:<38} {:<16} {:<28} {:<12} {}",
                    host.id,
                    host.name,
                    format!("{}@{}:{}", host.username, host.address, host.port),
                    host.auth.kind(),
                    host.tags.join(",")
                );
            }
            println!();
        }
    }

    Ok(())
}
