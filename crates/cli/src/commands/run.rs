//! `notebridge run`: the long-running bot process.
//!
//! Starts the Telegram poller when a token is configured, the Alice gateway
//! when enabled, and the periodic cleanup job. Ctrl+C or a fatal poller
//! error stops everything; running work is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use notebridge_channels::{LocalSource, TelegramSource, WhisperTranscriber};
use notebridge_config::AppConfig;
use notebridge_core::MessageSource;
use notebridge_gateway::AppContext;
use notebridge_workflow::Scheduler;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::bootstrap::start_router;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_telegram() && !config.gateway.enabled {
        return Err(
            "nothing to run: set telegram.token or enable the gateway (see `notebridge doctor`)"
                .into(),
        );
    }

    let telegram = if config.has_telegram() {
        let mut source = TelegramSource::new(&config.telegram)?;
        if let Some(transcription) = &config.transcription {
            match WhisperTranscriber::from_config(transcription) {
                Ok(transcriber) => source = source.with_transcriber(Arc::new(transcriber)),
                Err(e) => warn!(error = %e, "Transcription disabled"),
            }
        }
        Some(Arc::new(source))
    } else {
        None
    };

    let source: Arc<dyn MessageSource> = match &telegram {
        Some(telegram) => telegram.clone(),
        None => Arc::new(LocalSource::new()),
    };
    let router = start_router(&config, source)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::new();
    let cleanup_router = router.clone();
    scheduler.run_periodic(
        "cleanup",
        Duration::from_secs(config.cleanup.interval_secs),
        move || {
            let router = cleanup_router.clone();
            async move {
                let report = router.cleanup_done_notes().await;
                if report.is_clean() {
                    Ok(())
                } else {
                    Err(format!("{} backend(s) reported errors", failed_backends(&report)))
                }
            }
        },
    );

    let gateway = if config.gateway.enabled {
        let ctx = Arc::new(AppContext::from_config(router.clone(), &config));
        let gateway_config = config.clone();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = notebridge_gateway::start(&gateway_config, ctx, rx).await {
                error!(error = %e, "Gateway stopped with error");
            }
        }))
    } else {
        None
    };

    let mut poller = telegram.map(|t| tokio::spawn(t.run(shutdown_rx.clone())));

    info!(
        source = %router.source_name(),
        backends = router.registrations().len(),
        "notebridge running, press Ctrl+C to stop"
    );

    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());
    let mut poller_done = false;
    match poller.as_mut() {
        Some(handle) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
                joined = handle => {
                    poller_done = true;
                    match joined {
                        Ok(Ok(())) => info!("Telegram poller finished"),
                        Ok(Err(e)) => {
                            error!(error = %e, "Telegram poller failed");
                            result = Err(e.into());
                        }
                        Err(e) => result = Err(e.into()),
                    }
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
        }
    }

    shutdown_tx.send_replace(true);
    scheduler.shutdown();

    if let Some(handle) = poller.filter(|_| !poller_done) {
        match handle.await {
            Ok(Err(e)) => warn!(error = %e, "Telegram poller stopped with error"),
            Err(e) => warn!(error = %e, "Telegram poller task ended abnormally"),
            Ok(Ok(())) => {}
        }
    }
    if let Some(handle) = gateway {
        join_task("gateway", handle).await;
    }
    scheduler.join().await;

    info!("notebridge stopped");
    result
}

/// Await a background task, logging a panic or cancellation. Returns
/// whether the task ended normally.
async fn join_task(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(task = name, error = %e, "Background task ended abnormally");
            false
        }
    }
}

fn failed_backends(report: &notebridge_router::CleanupReport) -> usize {
    report.backends.iter().filter(|b| !b.is_clean()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_task_reports_clean_exit() {
        assert!(join_task("ok", tokio::spawn(async {})).await);
    }

    #[tokio::test]
    async fn join_task_reports_panicked_task() {
        let handle = tokio::spawn(async { panic!("gateway crashed") });
        assert!(!join_task("gateway", handle).await);
    }
}
