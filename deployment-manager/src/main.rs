use agent_protocol::{CommandSender, NotificationReceiver};
use clap::Parser;
use deployment_core::comms::{self, Address, TransportInput, TransportOutput};
use deployment_manager::{
    api, ChannelGateway, DmConfig, DmMessageProcessor, EventBus, LocalIaas, Manager,
};
use deployment_manager::persistence::StateStore;
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deployment manager daemon")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Deployment Manager Starting ===");

    let args = Args::parse();
    let config = DmConfig::load(args.config.as_deref())?;
    debug!("{:?}", config);

    // 1. Agent messaging
    let (outbox, inbox) = if config.use_in_memory_bus {
        info!("Using the in-memory agent bus (no agent will connect)");
        in_memory_bus()
    } else {
        let outbox_address: Address = config
            .agent_bus_bind
            .parse()
            .map_err(anyhow::Error::msg)?;
        let inbox_address: Address = config
            .agent_inbox_bind
            .parse()
            .map_err(anyhow::Error::msg)?;
        info!("Binding the agent bus to {} and {}", outbox_address, inbox_address);
        (
            comms::bind_outbox(&outbox_address)?,
            comms::bind_inbox(&inbox_address)?,
        )
    };

    // 2. Manager
    let manager = Manager::new(
        Arc::new(ChannelGateway::new(CommandSender::new(outbox))),
        Arc::new(LocalIaas::new()),
        StateStore::new(&config.config_dir),
        EventBus::new(),
    )
    .with_missed_heartbeats_threshold(config.missed_heartbeats_threshold);
    let restored = manager.restore_saved_applications()?;
    info!("{} application(s) restored from {}", restored, config.config_dir.display());
    let manager = Arc::new(manager);

    // 3. Notifications from agents
    let processor = DmMessageProcessor::new(manager.clone());
    tokio::spawn(processor.run(NotificationReceiver::new(inbox)));

    // 4. Liveness checks
    let checker = manager.clone();
    let interval = Duration::from_secs(config.check_states_interval_secs.max(1));
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            checker.check_states();
            checker.flush_all().await;
        }
    });

    // 5. REST API
    if let Err(e) = api::run_api_server(manager, config.api_port).await {
        error!("API server stopped: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Commands are only logged and the inbox never receives anything.
fn in_memory_bus() -> (Box<dyn TransportOutput>, Box<dyn TransportInput>) {
    let (outbox, mut commands) = comms::memory_channel(1024);
    let (notifications, inbox) = comms::memory_channel(1024);

    tokio::spawn(async move {
        // Keeps the inbox open
        let _notifications = notifications;
        while let Ok(frame) = commands.recv_frame().await {
            debug!("Command for {}: {} bytes", frame.topic, frame.payload.len());
        }
    });
    (outbox, inbox)
}
