//! Ctrl+C and SIGTERM handling for the long-running commands.
use tokio::sync::broadcast;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Broadcast channel size for shutdown notifications (single signal fan-out).
const SHUTDOWN_CHANNEL_CAPACITY: usize = 1;

#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    broadcast::channel::<()>(SHUTDOWN_CHANNEL_CAPACITY)
}

/// Forwards the first Ctrl+C (or SIGTERM on unix) to `shutdown_tx`. The task
/// also ends when something else sends on the channel.
pub fn setup_signal_shutdown_handler(shutdown_tx: &ShutdownSender) -> tokio::task::JoinHandle<()> {
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown_tx.subscribe();

        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                _ = tokio::signal::ctrl_c() => {
                    drop(shutdown_tx.send(()));
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    drop(shutdown_tx.send(()));
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                _ = tokio::signal::ctrl_c() => {
                    drop(shutdown_tx.send(()));
                }
            }
        }
    })
}

/// Resolves once a shutdown has been requested.
pub async fn wait_for_shutdown() {
    let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
    let handler = setup_signal_shutdown_handler(&shutdown_tx);
    let _signal = shutdown_rx.recv().await;
    handler.abort();
}
