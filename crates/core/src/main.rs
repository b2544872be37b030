use clap::Parser;

#[derive(Parser)]
#[command(name = "fleet_system", about = "Control tower for a fleet of task-execution agents")]
struct Cli {
    /// Path to the services registry file (overrides FLEET_SERVICES_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(fleet_core::config::exe_dir().join(".env"));
    }
    tracing_subscriber::fmt::init();

    let mut config = fleet_core::config::AppConfig::load()?;
    if let Some(path) = cli.config {
        config.services_config = path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    fleet_core::run_tower(config).await
}
