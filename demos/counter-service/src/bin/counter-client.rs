//! Counter client
//!
//! Run with: cargo run --bin counter-client -- <proxy-hex>

use clap::Parser;
use remote_object::{ObjectMethod, ObjectValue, RemoteError};
use remote_transport::SocketFactories;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use counter_service::{marshal_context, CounterClient, UNDERFLOW};

#[derive(Parser)]
#[command(name = "counter-client")]
#[command(about = "Call a remote counter")]
struct Args {
    /// Proxy hex printed by counter-server
    proxy: String,

    /// Amount to add on each call
    #[arg(short, long, default_value = "1")]
    delta: i64,

    /// Number of add calls
    #[arg(short = 'n', long, default_value = "3")]
    count: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let ctx = marshal_context(SocketFactories::global());
    let client = CounterClient::from_hex(&args.proxy, &ctx)?;

    // Answered locally, no round trip
    let proxy = client.proxy();
    if let ObjectValue::Text(text) = proxy
        .handler()
        .invoke_object_method(proxy, ObjectMethod::ToString)?
    {
        info!("Connected to {}", text);
    }

    for _ in 0..args.count {
        match client.add(args.delta).await {
            Ok(value) => info!("add({}) = {}", args.delta, value),
            Err(RemoteError::Application(fault)) if fault.type_name() == UNDERFLOW => {
                warn!("Counter refused: {}", fault.message());
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Final value: {}", client.value().await?);
    Ok(())
}
