use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chat_relay::{
    cli::{Cli, Command},
    client,
    journal::Journal,
    relay::Relay,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            let listener = TcpListener::bind(("0.0.0.0", args.port))
                .await
                .context("Ошибка привязки сокета")?;
            let journal = Journal::open(&args.log_file)
                .await
                .context("Ошибка открытия файла логов")?;
            let relay = Relay::new(listener, journal);
            info!("listening on {}", relay.local_addr()?);
            if let Err(error) = relay.run_until_ctrl_c().await {
                warn!("relay exited with an error: {error:?}");
                return Err(error);
            }
        }
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
