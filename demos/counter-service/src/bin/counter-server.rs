//! Counter server
//!
//! Run with: cargo run --bin counter-server -- --port 5000
//!
//! Prints the exported proxy as hex on stdout; hand that line to
//! `counter-client`.

use clap::Parser;
use remote_object::{Exporter, RuntimeConfig};
use remote_transport::SocketFactories;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use counter_service::{marshal_context, proxy_to_hex, CounterService};

#[derive(Parser)]
#[command(name = "counter-server")]
#[command(about = "Export a remote counter")]
struct Args {
    /// Port to listen on (0 picks a free one)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host name written into the proxy
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Initial counter value
    #[arg(long, default_value = "0")]
    initial: i64,

    /// Use random object ids
    #[arg(long)]
    random_ids: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = RuntimeConfig::from_env()
        .with_host_name(args.host.clone())
        .with_random_object_ids(args.random_ids);
    let factories = SocketFactories::global();
    let exporter = Exporter::new(config, factories.clone());

    let service = CounterService::new(args.initial);
    let proxy = exporter.export(service.clone(), args.port).await?;
    info!(
        "Exported counter as {:?}",
        exporter.object_id(service.as_ref())
    );

    println!("{}", proxy_to_hex(&proxy, &marshal_context(factories))?);

    info!("Serving until Ctrl+C");
    tokio::signal::ctrl_c().await?;

    let unexported = exporter.unexport(service.as_ref(), true)?;
    info!(
        "Shutting down (unexported: {}, final value: {})",
        unexported,
        service.value()
    );
    exporter.shutdown().await;

    Ok(())
}
