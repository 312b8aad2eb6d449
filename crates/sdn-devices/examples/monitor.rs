//! Bus sniffer: prints every frame seen on an SDN link.
//!
//! ```text
//! cargo run --example monitor -- /dev/ttyUSB0
//! cargo run --example monitor -- tcp://192.168.1.20:4000
//! ```

use sdn_core::logging;
use sdn_devices::transport::Transport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_filter("info")?;

    let port = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let mut transport = Transport::connect(&port, false).await?;
    println!("Listening on {}", port);

    transport
        .receive_each(None, |message| {
            println!("{} -> {} {:?}", message.src, message.dest, message.body);
        })
        .await?;
    Ok(())
}
