use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::backend::TaskProgress;
use crate::core::java::JavaPathResult;

/// Everything pushed from the core to subscribed surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum LauncherEvent {
    JavaPathResult(JavaPathResult),
    MinecraftInstallProgress(InstallEvent),
    Game(GameEvent),
    Surface(SurfaceEvent),
}

/// Why an operation was refused before it started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Rejection {
    #[error("Java path not configured. Please ensure Java is detected.")]
    JavaNotConfigured,

    #[error("Minecraft path not configured.")]
    DataDirectoryNotConfigured,

    #[error("Minecraft directory {path} is not usable: {reason}")]
    DataDirectoryUnavailable { path: String, reason: String },

    #[error("An install of {version} is already in progress.")]
    InstallInProgress { version: String },

    #[error("Game is already running.")]
    AlreadyRunning { version: String },

    #[error("Invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },
}

impl Rejection {
    /// True for "busy" refusals, false for missing configuration.
    pub fn is_concurrency(&self) -> bool {
        matches!(
            self,
            Rejection::InstallInProgress { .. } | Rejection::AlreadyRunning { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InstallOutcome {
    Installed,
    Failed { message: String },
    Rejected { reason: Rejection },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InstallEvent {
    Progress {
        version: String,
        task: TaskProgress,
    },
    Update {
        version: String,
        message: String,
        #[serde(rename = "isError")]
        is_error: bool,
    },
    /// Terminal: nothing follows for this session.
    Finished {
        version: String,
        outcome: InstallOutcome,
    },
}

impl InstallEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallEvent::Finished { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCloseEvent {
    pub version: String,
    pub code: Option<i32>,
    pub error: Option<String>,
    /// Set when the launch was refused rather than attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Rejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEvent {
    Started { version: String, pid: u32 },
    /// Terminal: fires once per launch request.
    Closed(GameCloseEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Main,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "surface", rename_all = "lowercase")]
pub enum SurfaceEvent {
    Opened(Surface),
    Focused(Surface),
    Closed(Surface),
}

/// Fan-out of [`LauncherEvent`]s to every subscribed surface.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LauncherEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: LauncherEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for launcher event");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription. Dropping it (or calling [`Subscription::detach`])
/// unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<LauncherEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone. Lagged events are skipped
    /// with a warning.
    pub async fn recv(&mut self) -> Option<LauncherEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<LauncherEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn into_stream(self) -> BroadcastStream<LauncherEvent> {
        BroadcastStream::new(self.rx)
    }

    pub fn detach(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_event_wire_shape() {
        let event = LauncherEvent::Game(GameEvent::Closed(GameCloseEvent {
            version: "1.18.2".into(),
            code: Some(0),
            error: None,
            rejected: None,
        }));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["channel"], "game");
        assert_eq!(json["payload"]["type"], "closed");
        assert_eq!(json["payload"]["code"], 0);
        assert!(json["payload"]["error"].is_null());
        assert!(json["payload"].get("rejected").is_none());
    }

    #[test]
    fn install_update_uses_is_error_key() {
        let event = LauncherEvent::MinecraftInstallProgress(InstallEvent::Update {
            version: "1.18.2".into(),
            message: "boom".into(),
            is_error: true,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["channel"], "minecraft-install-progress");
        assert_eq!(json["payload"]["type"], "update");
        assert_eq!(json["payload"]["isError"], true);
    }

    #[test]
    fn rejections_distinguish_busy_from_misconfigured() {
        assert!(Rejection::AlreadyRunning { version: "x".into() }.is_concurrency());
        assert!(Rejection::InstallInProgress { version: "x".into() }.is_concurrency());
        assert!(!Rejection::JavaNotConfigured.is_concurrency());
        assert_eq!(
            Rejection::AlreadyRunning { version: "x".into() }.to_string(),
            "Game is already running."
        );
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_order() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for surface in [Surface::Main, Surface::Settings] {
            bus.publish(LauncherEvent::Surface(SurfaceEvent::Opened(surface)));
        }

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.recv().await,
                Some(LauncherEvent::Surface(SurfaceEvent::Opened(Surface::Main)))
            );
            assert_eq!(
                sub.recv().await,
                Some(LauncherEvent::Surface(SurfaceEvent::Opened(Surface::Settings)))
            );
        }
    }

    #[test]
    fn detaching_drops_the_receiver() {
        let bus = EventBus::new(4);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        sub.detach();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
