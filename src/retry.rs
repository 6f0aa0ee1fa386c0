//! Bounded retry shared by every networked component.

use core::fmt::Display;

use embassy_time::Duration;
use log::{info, warn};

use crate::{config::RetryPolicy, hal::Platform};

/// Block for `duration` using the platform delay
pub fn sleep<P: Platform>(platform: &mut P, duration: Duration) {
    let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    platform.delay_ms(ms);
}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
///
/// `op` receives the platform and the 1-based attempt number. The fixed
/// policy delay separates attempts; there is no backoff. The last error is
/// returned when every attempt fails.
pub fn retry<P, T, E, F>(platform: &mut P, policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    P: Platform,
    E: Display,
    F: FnMut(&mut P, u32) -> Result<T, E>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(platform, attempt) {
            Ok(value) => {
                if attempt > 1 {
                    info!("{what} succeeded on attempt {attempt}/{attempts}");
                }
                return Ok(value);
            }
            Err(err) if attempt < attempts => {
                warn!("{what} failed on attempt {attempt}/{attempts}: {err}");
                sleep(platform, policy.delay);
                attempt += 1;
            }
            Err(err) => {
                warn!("{what} failed after {attempts} attempts: {err}");
                return Err(err);
            }
        }
    }
}
