use crate::loader::Loader;
use crate::snapshot::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Periodic rebuild of the view tables. Only a successful load is published;
/// a failed one leaves the current snapshot serving.
pub struct ReloadScheduler {
    loader: Loader,
    store: Arc<SnapshotStore>,
    period: Duration,
}

/// Owns the background reload task; `shutdown` stops it.
pub struct ReloadHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ReloadScheduler {
    /// A zero period is raised to one second; tokio intervals reject zero.
    pub fn new(loader: Loader, store: Arc<SnapshotStore>, period: Duration) -> Self {
        let period = if period.is_zero() {
            warn!(fallback = ?MIN_PERIOD, "período de recarga cero, uso el mínimo");
            MIN_PERIOD
        } else {
            period
        };
        Self {
            loader,
            store,
            period,
        }
    }

    /// Starts the timer. The startup load already published the first
    /// snapshot, so the first tick fires one period from now.
    pub fn start(self) -> ReloadHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!(
            clients = %self.loader.clients(),
            records = %self.loader.records(),
            period = ?self.period,
            "recarga periódica iniciada"
        );
        let join = tokio::spawn(self.run(shutdown_rx));
        ReloadHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {}
            }

            // una carga en curso se abandona si llega el apagado
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                res = self.loader.load() => match res {
                    Ok(report) => {
                        debug!(skipped = report.issues.len(), "snapshot nuevo publicado");
                        self.store.publish(report.snapshot);
                    }
                    Err(e) => error!(error = %e, "recarga fallida, sigo con el snapshot anterior"),
                },
            }
        }

        info!("recarga periódica detenida");
    }
}

impl ReloadHandle {
    /// Signals the task and waits for it to exit. No load starts after this
    /// returns and the interval timer is dropped with the task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            error!(error = %e, "la tarea de recarga terminó con error");
        }
    }
}

impl Drop for ReloadHandle {
    fn drop(&mut self) {
        // sin shutdown explícito: no dejar el timer vivo
        if self.shutdown_tx.is_some() {
            self.join.abort();
        }
    }
}
