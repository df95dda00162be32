use std::time::Duration;

use condaview_registry::Registry;
use miette::{miette, IntoDiagnostic};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Reloads every channel each `interval` until Ctrl-C.
///
/// The registry is expected to be loaded already, so the first reload
/// happens one interval after the call.
pub async fn watch(registry: &Registry, interval: Duration) -> miette::Result<()> {
    if interval.is_zero() {
        return Err(miette!("Refresh interval must be longer than zero"));
    }

    info!(
        "Reloading {} channels every {:?}, press Ctrl-C to stop",
        registry.channel_labels().len(),
        interval
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = registry.reload_all().await;
                let failed = summary.failed().count();
                if failed > 0 {
                    warn!("{} of {} channels failed to reload", failed, summary.channels.len());
                }
                info!(
                    packages = summary.packages,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Refreshed {} packages in {:.1} sec",
                    summary.packages,
                    summary.elapsed.as_secs_f64()
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.into_diagnostic()?;
                info!("Stopping");
                return Ok(());
            }
        }
    }
}
