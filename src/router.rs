//! Single-character command dispatch for inbound control frames.
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::transport::{Frame, FrameHandler};

/// Receives the sender's address and the payload after the tag.
pub type CommandHandler = Arc<dyn Fn(Ipv4Addr, &str) + Send + Sync>;

pub struct CommandRouter {
    handlers: RwLock<HashMap<char, CommandHandler>>,
    enabled: AtomicBool,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Installs `handler` for `tag`, replacing any previous one.
    pub fn register(&self, tag: char, handler: CommandHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag, handler);
    }

    pub fn unregister(&self, tag: char) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tag)
            .is_some()
    }

    #[must_use]
    pub fn is_registered(&self, tag: char) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&tag)
    }

    /// Suppresses or restores dispatch; registrations are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Routes `payload` to the handler for its first character. Returns
    /// `true` when a handler ran.
    pub fn dispatch(&self, sender: Ipv4Addr, payload: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut chars = payload.chars();
        let Some(tag) = chars.next() else {
            return false;
        };
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .cloned();
        match handler {
            Some(handler) => {
                handler(sender, chars.as_str());
                true
            }
            None => {
                tracing::trace!("No handler for command '{}' from {}", tag, sender);
                false
            }
        }
    }

    /// Adapts this router into a transport frame handler.
    #[must_use]
    pub fn frame_handler(self: &Arc<Self>) -> FrameHandler {
        let router = Arc::clone(self);
        Arc::new(move |frame: &Frame| {
            router.dispatch(frame.sender, &frame.payload);
        })
    }
}

/// The process-wide router used by the agent and watcher commands.
pub fn command_router() -> &'static Arc<CommandRouter> {
    static ROUTER: OnceLock<Arc<CommandRouter>> = OnceLock::new();
    ROUTER.get_or_init(|| Arc::new(CommandRouter::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(Ipv4Addr, String)>>>;

    fn recording_router(tag: char) -> (CommandRouter, Seen) {
        let router = CommandRouter::new();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        router.register(
            tag,
            Arc::new(move |sender, body| {
                crate::sync::lock(&sink).push((sender, body.to_owned()));
            }),
        );
        (router, seen)
    }

    #[test]
    fn dispatch_strips_tag_and_passes_sender() -> AppResult<()> {
        let (router, seen) = recording_router('S');
        let sender = Ipv4Addr::new(10, 0, 0, 2);
        if !router.dispatch(sender, "S<Test></Test>") {
            return Err(AppError::validation("handler not invoked"));
        }
        let calls = crate::sync::lock(&seen).clone();
        if calls != vec![(sender, "<Test></Test>".to_owned())] {
            return Err(AppError::validation(format!("calls {:?}", calls)));
        }
        Ok(())
    }

    #[test]
    fn unknown_and_empty_frames_are_ignored() -> AppResult<()> {
        let (router, seen) = recording_router('S');
        if router.dispatch(Ipv4Addr::LOCALHOST, "Xbody") || router.dispatch(Ipv4Addr::LOCALHOST, "")
        {
            return Err(AppError::validation("unrouted frame reported as handled"));
        }
        if !crate::sync::lock(&seen).is_empty() {
            return Err(AppError::validation("handler ran for another tag"));
        }
        Ok(())
    }

    #[test]
    fn disabling_keeps_registrations() -> AppResult<()> {
        let (router, seen) = recording_router('H');
        router.set_enabled(false);
        if router.dispatch(Ipv4Addr::LOCALHOST, "Hidle") {
            return Err(AppError::validation("dispatched while disabled"));
        }
        router.set_enabled(true);
        if !router.is_registered('H') || !router.dispatch(Ipv4Addr::LOCALHOST, "Hrun") {
            return Err(AppError::validation("registration lost"));
        }
        if crate::sync::lock(&seen).len() != 1 {
            return Err(AppError::validation("unexpected call count"));
        }
        Ok(())
    }
}
