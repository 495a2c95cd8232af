use anyhow::Context;
use clap::Parser;
use payment_gateway::app::{config::Config, telemetry};
use payment_gateway::clock::{Clock, SystemClock};
use payment_gateway::queue::create_queue;
use payment_gateway::services::{Dispatcher, FixedWindowRateLimiter, LifecycleEngine, MockProvider};
use payment_gateway::storage::InMemoryPaymentStore;
use payment_gateway::{EngineError, NewPayment};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Rate-limited payment lifecycle engine", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of demo payments to submit at startup
    #[arg(long, default_value_t = 10)]
    payments: u32,

    /// Seconds to keep dispatching before printing the summary and exiting
    #[arg(long, default_value_t = 15)]
    run_for_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            let config = Config::from_env();
            config.validate()?;
            config
        }
    };
    telemetry::init(&config.log_filter);
    info!(max_rate = config.max_rate, max_retries = config.max_retries, "starting payment gateway engine");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryPaymentStore::new());
    let provider = Arc::new(MockProvider::new(config.mock_provider.clone()));
    let limiter = Arc::new(FixedWindowRateLimiter::new(
        config.max_rate,
        config.rate_window(),
        config.permit_poll_interval(),
        clock.clone(),
    ));

    let engine = Arc::new(LifecycleEngine::new(
        store,
        provider,
        clock,
        config.engine_settings(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        engine.clone(),
        limiter,
        config.dispatcher_settings(),
    ));

    let (trigger, trigger_receiver) = create_queue(config.trigger_buffer_size);
    let handle = dispatcher.spawn(trigger_receiver);

    for n in 1..=cli.payments {
        let payload = NewPayment {
            amount: Decimal::new(1000 + i64::from(n) * 250, 2),
            currency: "USD".to_string(),
            merchant_id: format!("merchant-{}", n % 3),
            customer_id: format!("customer-{}", n),
            description: Some(format!("demo order {}", n)),
        };
        match engine.create(format!("demo-{}", n), payload).await {
            Ok(payment) => {
                trigger.trigger_immediate(payment.id);
            }
            Err(e) => warn!(error = %e, "demo intake rejected"),
        }
    }

    // Replaying a key must not create a second payment.
    if cli.payments > 0 {
        let replay = NewPayment {
            amount: Decimal::new(2000, 2),
            currency: "USD".to_string(),
            merchant_id: "merchant-1".to_string(),
            customer_id: "customer-1".to_string(),
            description: None,
        };
        match engine.create("demo-1", replay).await {
            Err(EngineError::DuplicateKey(key)) => {
                let existing = engine.get_by_idempotency_key(&key).await?;
                info!(payment_id = %existing.id, "duplicate intake resolved to existing payment");
            }
            other => warn!(result = ?other, "expected duplicate key rejection"),
        }
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.run_for_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
    }

    handle.shutdown().await;

    let summary = engine.summary().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
