//! Periodic expiry of abandoned sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::service::IntakeService;

/// Sweep idle sessions every `every` until the handle is aborted.
pub fn spawn_reaper(service: Arc<IntakeService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), idle_timeout_secs = service.idle_timeout().as_secs(), "Session reaper started");
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = service.reap_idle().await;
            if expired > 0 {
                info!(expired, "Reaped idle sessions");
            } else {
                debug!("Reaper tick: nothing idle");
            }
        }
    })
}

/// A sweep interval proportional to the idle timeout, clamped to [1s, 60s].
pub fn sweep_interval(idle_timeout: Duration) -> Duration {
    (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docintake_config::{IntakeConfig, SessionConfig};
    use docintake_core::{InboundEvent, OutboundEvent, SessionEvent, Submission, WorkbookSink};
    use docintake_understanding::{CountingLoader, EngineCell, MockVisionModel};
    use tokio::sync::mpsc;

    struct NullSink;

    #[async_trait::async_trait]
    impl WorkbookSink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        async fn submit(&self, _session_id: &str, _submission: &Submission) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sweep_interval_is_clamped() {
        assert_eq!(sweep_interval(Duration::from_secs(2)), Duration::from_secs(1));
        assert_eq!(sweep_interval(Duration::from_secs(120)), Duration::from_secs(30));
        assert_eq!(sweep_interval(Duration::from_secs(3600)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn reaper_expires_idle_session() {
        let config = IntakeConfig {
            session: Some(SessionConfig { idle_timeout_secs: Some(0), ..Default::default() }),
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::channel::<OutboundEvent>(16);
        let cell: &'static EngineCell = Box::leak(Box::new(EngineCell::new()));
        let loader = Arc::new(CountingLoader::new(Arc::new(MockVisionModel::new("m"))));
        let service = Arc::new(IntakeService::new(&config, loader, Arc::new(NullSink), tx).with_engine_cell(cell));

        service.handle(InboundEvent::SessionStart { session_id: "u1".into() }).await.unwrap();
        let reaper = spawn_reaper(service.clone(), Duration::from_millis(10));

        let mut saw_expiry = false;
        while let Ok(Some(outbound)) = time::timeout(Duration::from_secs(2), rx.recv()).await {
            if outbound.event == SessionEvent::SessionExpired {
                assert_eq!(outbound.session_id, "u1");
                saw_expiry = true;
                break;
            }
        }
        reaper.abort();
        assert!(saw_expiry);
        assert!(service.registry().is_empty().await);
    }
}
