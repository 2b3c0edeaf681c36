//! Background loops: settlement, market refresh and stale-challenge pruning.
//!
//! Each loop is an independent interval task. All three stop when the
//! shutdown channel flips to `true` (or its sender is dropped).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::manager::BattleManager;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub settlement_interval: Duration,
    pub price_refresh_interval: Duration,
    pub prune_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            settlement_interval: Duration::from_secs(10),
            price_refresh_interval: Duration::from_secs(300),
            prune_interval: Duration::from_secs(3600),
        }
    }
}

/// Spawn all background loops.
pub fn spawn_pollers(
    manager: Arc<BattleManager>,
    config: PollerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let settle = {
        let manager = manager.clone();
        spawn_loop("settlement", config.settlement_interval, shutdown.clone(), move || {
            let manager = manager.clone();
            async move {
                match manager.settle_due(None).await {
                    Ok(report) if !report.settled.is_empty() => {
                        tracing::info!(settled = report.settled.len(), "settlement poller tick");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "settlement pass failed"),
                }
            }
        })
    };

    let refresh = {
        let manager = manager.clone();
        spawn_loop("price-refresh", config.price_refresh_interval, shutdown.clone(), move || {
            let manager = manager.clone();
            async move {
                manager.refresh_market().await;
            }
        })
    };

    let prune = spawn_loop("prune", config.prune_interval, shutdown, move || {
        let manager = manager.clone();
        async move {
            if let Err(e) = manager.prune_stale_challenges().await {
                tracing::warn!(error = %e, "stale challenge pruning failed");
            }
        }
    });

    vec![settle, refresh, prune]
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(poller = name, period_ms = period.as_millis() as u64, "poller started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tracing::debug!(poller = name, "tick");
                    // a panicking tick is contained to its own task
                    if let Err(e) = tokio::spawn(tick()).await {
                        if e.is_panic() {
                            tracing::error!(poller = name, "poller tick panicked");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(poller = name, "poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loop_survives_panicking_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = ticks.clone();
        let handle = spawn_loop("test", Duration::from_millis(5), rx, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    panic!("first tick fails");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }
}
