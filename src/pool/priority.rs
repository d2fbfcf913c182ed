/// Per-item scheduling hint for the executing worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadPriority {
    Lowest,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    Highest,
}

impl ThreadPriority {
    /// Unix nice value for this level.
    #[must_use]
    pub const fn nice(self) -> i32 {
        match self {
            ThreadPriority::Lowest => 10,
            ThreadPriority::BelowNormal => 5,
            ThreadPriority::Normal => 0,
            ThreadPriority::AboveNormal => -5,
            ThreadPriority::Highest => -10,
        }
    }
}

/// Applies `priority` to the calling thread. Raising priority usually needs
/// privileges; a refusal is logged and otherwise ignored.
#[cfg(target_os = "linux")]
pub(crate) fn apply_current(priority: ThreadPriority) {
    // SAFETY: `gettid` has no preconditions and only returns the caller's id.
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    let Ok(who) = libc::id_t::try_from(tid) else {
        return;
    };
    // SAFETY: `setpriority` only reads its scalar arguments; `who` is this
    // thread's own id.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, who, priority.nice()) };
    if rc != 0 {
        tracing::debug!(
            "setpriority({:?}) refused: {}",
            priority,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn apply_current(priority: ThreadPriority) {
    tracing::trace!("thread priority {:?} not supported on this platform", priority);
}
