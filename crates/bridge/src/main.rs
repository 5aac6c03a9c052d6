// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use rehau_bridge::config::Config;

#[derive(Parser)]
#[command(name = "rehau-bridge", version, about = "Bridge between the Rehau Neasmart cloud and a local MQTT broker.")]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    rehau_bridge::logging::init(&cli.config);

    match rehau_bridge::supervisor::run(cli.config).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
