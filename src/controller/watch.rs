use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::FrameError;
use crate::protocol::{AgentStatus, HEARTBEAT_TAG, METRICS_TAG, MetricsReport};
use crate::router::{CommandHandler, CommandRouter};
use crate::sync::lock;

use super::board::{AgentBoard, watch_line};

/// Receives every rendered watch line.
pub type LineWriter = Arc<dyn Fn(&str) + Send + Sync>;

/// Feeds heartbeats and metrics frames into an [`AgentBoard`].
pub struct Watcher {
    board: Mutex<AgentBoard>,
    writer: LineWriter,
}

impl Watcher {
    #[must_use]
    pub const fn new(board: AgentBoard, writer: LineWriter) -> Self {
        Self {
            board: Mutex::new(board),
            writer,
        }
    }

    /// A copy of the board as it is now.
    #[must_use]
    pub fn board(&self) -> AgentBoard {
        lock(&self.board).clone()
    }

    /// # Errors
    ///
    /// Returns an error for an unknown status word.
    pub fn handle_heartbeat(&self, sender: Ipv4Addr, body: &str) -> Result<(), FrameError> {
        let status = AgentStatus::parse(body)?;
        let previous = lock(&self.board).observe_heartbeat(sender, status);
        match previous {
            None => info!("Discovered agent {} ({})", sender, status),
            Some(previous) if previous != status => {
                info!("Agent {} is now {}", sender, status);
            }
            Some(_) => debug!("Heartbeat from {}", sender),
        }
        Ok(())
    }

    /// Records the report and writes the fleet line for it. Returns the line,
    /// or `None` when the sender has not sent a heartbeat yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not a metrics report.
    pub fn handle_metrics(&self, sender: Ipv4Addr, body: &str) -> Result<Option<String>, FrameError> {
        let report = MetricsReport::parse(body)?;
        let now = Instant::now();
        let totals = {
            let mut board = lock(&self.board);
            if !board.observe_metrics_at(sender, &report, now) {
                debug!("Ignoring metrics from unannounced agent {}", sender);
                return Ok(None);
            }
            board.totals_at(sender, now)
        };
        let line = watch_line(sender, &report, &totals);
        (self.writer)(&line);
        Ok(Some(line))
    }

    /// Installs heartbeat and metrics handlers on `router`.
    pub fn register_with(self: &Arc<Self>, router: &CommandRouter) {
        let weak = Arc::downgrade(self);
        router.register(
            HEARTBEAT_TAG,
            handler(&weak, |watcher, sender, body| watcher.handle_heartbeat(sender, body)),
        );
        router.register(
            METRICS_TAG,
            handler(&weak, |watcher, sender, body| {
                let _line = watcher.handle_metrics(sender, body)?;
                Ok(())
            }),
        );
    }

    pub fn unregister_from(router: &CommandRouter) {
        for tag in [HEARTBEAT_TAG, METRICS_TAG] {
            let _removed = router.unregister(tag);
        }
    }
}

fn handler(
    weak: &Weak<Watcher>,
    action: fn(&Watcher, Ipv4Addr, &str) -> Result<(), FrameError>,
) -> CommandHandler {
    let weak = Weak::clone(weak);
    Arc::new(move |sender, body| {
        let Some(watcher) = weak.upgrade() else {
            return;
        };
        if let Err(err) = action(&watcher, sender, body) {
            debug!("Dropping malformed frame from {}: {}", sender, err);
        }
    })
}
