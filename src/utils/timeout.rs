//! Timeout helpers and default durations.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Default request timeout for a single round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default discovery window.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lower bound applied to adaptive timeouts.
pub const MIN_ADAPTIVE_TIMEOUT: Duration = Duration::from_millis(250);

/// Run `fut` with a deadline, mapping expiry to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
