//! Tick driver and background tasks
//!
//! One fixed-rate timer ticks every room. Lobby writes run on a separate
//! task fed by an unbounded channel, and ended rooms are torn down by
//! delayed tasks after the grace period.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::RoomId;
use crate::gateway::{self, Gateway, LobbyService, Notice, TokenVerifier, Transport};
use crate::registry::RoomRegistry;
use crate::settings::Settings;

/// Milliseconds since the Unix epoch, as sent in snapshots
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Running server: the gateway plus its background tasks
pub struct Server {
    gateway: Gateway,
    tick_task: JoinHandle<()>,
    notifier_task: JoinHandle<()>,
}

impl Server {
    /// Build the gateway and spawn the tick and notifier tasks.
    /// Must be called from inside a tokio runtime.
    pub fn start(
        settings: Settings,
        verifier: Arc<dyn TokenVerifier>,
        transport: Arc<dyn Transport>,
        lobby: Arc<dyn LobbyService>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = RoomRegistry::new(settings.default_variant(), settings.seed);
        let gateway = Gateway::new(registry, verifier, transport, tx);

        info!(
            "Starting tick loop: {} ms, default variant {}",
            settings.tick_interval_ms,
            settings.variant.as_str()
        );
        let notifier_task = spawn_notifier(lobby, rx);
        let tick_task = spawn_tick_loop(gateway.clone(), settings);

        Self {
            gateway,
            tick_task,
            notifier_task,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Stop ticking, then wait for pending teardowns and queued lobby notices.
    /// Callers must drop their own gateway clones first.
    pub async fn shutdown(self) {
        self.tick_task.abort();
        let Self {
            gateway,
            notifier_task,
            ..
        } = self;
        // The notifier exits once every sender is gone
        drop(gateway);
        if let Err(e) = notifier_task.await {
            debug!("Notifier task ended abnormally: {}", e);
        }
    }
}

/// Deliver lobby notices until every sender is dropped
pub fn spawn_notifier(
    lobby: Arc<dyn LobbyService>,
    mut notices: mpsc::UnboundedReceiver<Notice>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            gateway::deliver(lobby.as_ref(), notice).await;
        }
        debug!("Notifier stopped");
    })
}

pub fn spawn_tick_loop(gateway: Gateway, settings: Settings) -> JoinHandle<()> {
    tokio::spawn(run_tick_loop(gateway, settings))
}

async fn run_tick_loop(gateway: Gateway, settings: Settings) {
    let mut interval = tokio::time::interval(settings.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let dt = settings.tick_dt();

    loop {
        interval.tick().await;
        for room_id in gateway.tick_all(dt, unix_millis()) {
            schedule_teardown(gateway.clone(), room_id, settings.end_grace());
        }
        gateway.expire_idle(gateway::now(), settings.empty_room_timeout());
    }
}

/// Tear a room down once `grace` has elapsed
pub fn schedule_teardown(gateway: Gateway, room_id: RoomId, grace: Duration) -> JoinHandle<()> {
    info!("Room {} ended; teardown in {:?}", room_id, grace);
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if gateway.teardown_ended(&room_id) {
            info!("Room {} torn down", room_id);
        } else {
            debug!("Room {} was replaced or already gone; teardown skipped", room_id);
        }
    })
}
