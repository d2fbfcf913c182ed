use std::time::Duration;

use crate::error::TransportError;
use crate::stop::StopSignal;

/// Runs `body` until it returns `Ok` or `signal` stops. Each failure is
/// logged and retried after `backoff`; a stop cuts the backoff short.
pub(crate) fn run_with_retry<F>(role: &str, backoff: Duration, signal: &StopSignal, mut body: F)
where
    F: FnMut() -> Result<(), TransportError>,
{
    loop {
        if signal.is_stopped() {
            return;
        }
        match body() {
            Ok(()) => return,
            Err(err) => {
                tracing::warn!("{} failed: {}; retrying in {:?}", role, err, backoff);
            }
        }
        if signal.sleep(backoff) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::stop::stop_channel;

    #[test]
    fn failures_are_retried_until_success() -> AppResult<()> {
        let (_handle, signal) = stop_channel();
        let mut attempts = 0_u32;
        run_with_retry("test loop", Duration::from_millis(1), &signal, || {
            attempts = attempts.saturating_add(1);
            if attempts < 3 {
                Err(TransportError::from("transient"))
            } else {
                Ok(())
            }
        });
        if attempts != 3 {
            return Err(AppError::transport(format!("attempts {}", attempts)));
        }
        Ok(())
    }

    #[test]
    fn stop_interrupts_backoff() -> AppResult<()> {
        let (mut handle, signal) = stop_channel();
        let worker = std::thread::spawn(move || {
            let started = std::time::Instant::now();
            run_with_retry("test loop", Duration::from_secs(60), &signal, || {
                Err(TransportError::Oversized { len: 1, max: 0 })
            });
            started.elapsed()
        });
        std::thread::sleep(Duration::from_millis(20));
        handle.trigger();
        let elapsed = worker
            .join()
            .map_err(|_panic| AppError::transport("retry thread panicked"))?;
        if elapsed > Duration::from_secs(5) {
            return Err(AppError::transport("stop did not cut the backoff"));
        }
        Ok(())
    }
}
