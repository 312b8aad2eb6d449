//! Runs the SDN bridge from a configuration file.
//!
//! ```text
//! cargo run --example bridge -- sdn.toml
//! SDN__TRANSPORT__PORT=tcp://192.168.1.20:4000 cargo run --example bridge
//! ```
//!
//! The process exits with 2 when the link stops delivering frames and
//! with 1 when frames can no longer be written.

use anyhow::Context;
use sdn_core::config::ConfigBuilder;
use sdn_core::logging;
use sdn_engine::Bridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::new().with_environment_prefix("SDN");
    if let Some(path) = std::env::args().nth(1) {
        builder = builder.with_config_file(path);
    }
    let config = builder.build().context("loading configuration")?;
    logging::init_from_config(&config.logging).context("initializing logging")?;

    let bridge = Bridge::new(config);
    let transport = bridge.connect().await.context("opening transport")?;
    if let Err(e) = bridge.run(transport).await {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
    Ok(())
}
