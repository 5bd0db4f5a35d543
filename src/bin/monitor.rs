use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sensor_monitoring::{
    Monitor,
    config::read_config_or_default,
    open_store,
    storage::{EntityStore, Limitation},
    util::get_config_path,
};
use serde_json::json;
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults to $MONITORING_CONFIG or ./monitoring.json)
    #[arg(short)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Ingest a single reading
    Ingest {
        #[arg(long)]
        sensor: i64,
        #[arg(long, allow_negative_numbers = true)]
        value: f64,
    },

    /// Register a new sensor
    AddSensor {
        #[arg(long)]
        room: i64,
        #[arg(long = "type")]
        sensor_type: String,
        #[arg(long)]
        inactive: bool,
    },

    /// Create or replace the limitation of a sensor type in a room
    SetLimit {
        #[arg(long)]
        room: i64,
        #[arg(long = "type")]
        sensor_type: String,
        #[arg(long, allow_negative_numbers = true)]
        min: i64,
        #[arg(long, allow_negative_numbers = true)]
        max: i64,
    },

    /// Mark an event as eliminated
    Eliminate {
        #[arg(long)]
        sensor: i64,
        /// Event time as RFC 3339, as printed by `events`
        #[arg(long)]
        time: DateTime<Utc>,
    },

    /// List all events of a sensor
    Events {
        #[arg(long)]
        sensor: i64,
    },

    /// List all stored indications of a sensor
    Indications {
        #[arg(long)]
        sensor: i64,
    },

    /// Print store health and statistics
    Stats,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("sensor_monitoring", LevelFilter::DEBUG),
        ("sensor_monitor", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config_path = args.file.clone().unwrap_or_else(get_config_path);
    let config = read_config_or_default(&config_path)?;

    let store = open_store(&config.storage).await?;
    let result = run(args.command, &config.monitoring, store.clone()).await;
    store.close().await?;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(
    command: Command,
    config: &sensor_monitoring::config::MonitoringConfig,
    store: std::sync::Arc<dyn EntityStore>,
) -> anyhow::Result<serde_json::Value> {
    let output = match command {
        Command::Ingest { sensor, value } => {
            let monitor = Monitor::new(store, config);
            let report = monitor.ingest(sensor, value).await?;
            json!({
                "sensor_id": report.sensor_id,
                "time": report.time,
                "status": report.status,
                "recorded": report.is_recorded(),
                "degraded": report.is_degraded(),
                "indication": report.indication.to_string(),
                "retention": report.retention.to_string(),
                "event": report.event.to_string(),
            })
        }
        Command::AddSensor {
            room,
            sensor_type,
            inactive,
        } => {
            let sensor = store.create_sensor(room, &sensor_type, !inactive).await?;
            serde_json::to_value(sensor)?
        }
        Command::SetLimit {
            room,
            sensor_type,
            min,
            max,
        } => {
            let limitation = Limitation {
                sensor_type,
                room_id: room,
                max,
                min,
            };
            store.set_limitation(limitation.clone()).await?;
            serde_json::to_value(limitation)?
        }
        Command::Eliminate { sensor, time } => {
            let eliminated = store.eliminate_event(sensor, time).await?;
            if !eliminated {
                anyhow::bail!("no event for sensor {sensor} at {time}");
            }
            json!({ "sensor_id": sensor, "time": time, "eliminated": true })
        }
        Command::Events { sensor } => serde_json::to_value(store.list_events(sensor).await?)?,
        Command::Indications { sensor } => serde_json::to_value(
            store
                .list_indications(sensor, DateTime::<Utc>::MIN_UTC)
                .await?,
        )?,
        Command::Stats => {
            let health = store.health_check().await?;
            json!({
                "healthy": health.healthy,
                "message": health.message,
                "metadata": health.metadata,
                "stats": store.get_stats().await?,
            })
        }
    };

    Ok(output)
}
