use anyhow::Result;
use hub_load_simulator::{config, hub, load, telemetry};
use config::Config;
use hub::{CallbackHandler, WebSocketHubConnector};
use load::{HubTarget, LoadController};
use std::sync::Arc;
use telemetry::init_tracing;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let connector = Arc::new(WebSocketHubConnector::new(cfg.transport.clone())?);
    let controller = LoadController::new(connector);

    let mut target = HubTarget::new(&cfg.hub.url, &cfg.hub.name, &cfg.hub.method)
        .with_parameters(cfg.hub.parameters.clone());
    if let Some(method) = cfg.hub.callback_method.clone() {
        let name = method.clone();
        let handler: CallbackHandler = Arc::new(move |payload| {
            info!(callback = %name, %payload, "hub callback received");
        });
        target = target.with_callback(method, handler);
    }
    controller.configure(target)?;

    let run = controller.run(cfg.load)?;
    info!(url = %cfg.hub.url, hub = %cfg.hub.name, started_at = %run.started_at(), "load test running");
    println!("Running load test. Press enter key to exit...");

    let mut enter = wait_for_enter();
    let finished = tokio::select! {
        _ = &mut enter => false,
        _ = telemetry::shutdown_signal() => false,
        _ = run.finished() => true,
    };
    if finished {
        info!(stats = ?run.stats(), "load test finished, press enter key to exit");
        tokio::select! {
            _ = &mut enter => {}
            _ = telemetry::shutdown_signal() => {}
        }
    }

    controller.stop();
    run.finished().await;

    let stats = run.stats();
    info!(
        pool_size = run.pool_size(),
        connections_opened = stats.connections_opened,
        connections_failed = stats.connections_failed,
        invocations_sent = stats.invocations_sent,
        invocations_failed = stats.invocations_failed,
        invocations_skipped = stats.invocations_skipped,
        callbacks_received = stats.callbacks_received,
        "shutdown complete"
    );
    Ok(())
}

/// Stdin is read on a plain thread so a pending read never holds up runtime shutdown
fn wait_for_enter() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if let Err(e) = std::io::stdin().read_line(&mut line) {
            warn!(error = %e, "failed to read from stdin");
        }
        let _ = tx.send(());
    });
    rx
}
