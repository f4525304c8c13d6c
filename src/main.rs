use clap::Parser;
use eventhub::{event_bus, init_event_bus, init_logging, EventBusConfig, EventSource};
use futures::stream;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Runs a small storefront scenario through the event bus
#[derive(Parser, Debug)]
#[command(name = "eventhub", version, about)]
struct Cli {
    /// Event bus configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long the scenario runs, in milliseconds
    #[arg(long, default_value_t = 500)]
    duration_ms: u64,

    /// Log at DEBUG level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone)]
struct CartChanged {
    entries: u32,
}

#[derive(Debug, Clone)]
struct UserLoggedIn {
    customer: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => EventBusConfig::load_from_file(path)?,
        None => EventBusConfig::default(),
    };
    if init_event_bus(config).is_err() {
        warn!("Event bus already initialized, keeping its configuration");
    }
    let bus = event_bus();

    // A lazy producer: the cart only ticks while somebody listens.
    let cart = bus.register(EventSource::new(|| {
        stream::unfold(0u32, |entries| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let entries = entries + 1;
            Some((CartChanged { entries }, entries))
        })
    }));

    let mut mini_cart = bus.get::<CartChanged>().subscribe()?;
    let mut analytics = bus.get::<CartChanged>().subscribe()?;
    let mut logins = bus.get::<UserLoggedIn>().subscribe()?;

    let mini_cart_task = tokio::spawn(async move {
        while let Some(cart) = mini_cart.recv().await {
            info!(entries = cart.entries, "mini-cart refreshed");
        }
    });
    let analytics_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(cart) = analytics.recv() => info!(entries = cart.entries, "analytics: cart changed"),
                Some(login) = logins.recv() => info!(customer = %login.customer, "analytics: login"),
                else => break,
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    let delivered = bus.dispatch(UserLoggedIn {
        customer: "ada".to_string(),
    });
    info!(delivered, "login dispatched");

    tokio::time::sleep(Duration::from_millis(cli.duration_ms)).await;
    cart.revoke();

    for key in bus.event_types() {
        info!(event_type = %key, "registered event type");
    }
    info!(
        cart_sources = bus.source_count::<CartChanged>(),
        login_sources = bus.source_count::<UserLoggedIn>(),
        "scenario finished"
    );

    mini_cart_task.abort();
    analytics_task.abort();
    Ok(())
}
