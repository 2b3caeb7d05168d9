//! `inv` - streetwear inventory command line
//!
//! Items, consigners, locations, photos, exports and the REST API over one
//! SQLite database described by `config.yaml`.

use clap::Parser;
use streetwear_inventory::commands::{self, Cli};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    log::debug!("Running {:?}", cli.command);

    if let Err(e) = commands::run(cli).await {
        println!("❌ {}", e);
        // Bad input and lookup misses are reported but are not failures
        if !e.is_user_error() {
            log::error!("Command failed: {:?}", e);
            std::process::exit(1);
        }
    }
}
