//! Action executor - one transport call per model action

use std::time::Duration;

use tracing::{info, warn};

use super::{DeviceTransport, SwipeDirection};
use crate::brain::Action;

/// Maps [`Action`]s onto [`DeviceTransport`] calls. Never retries.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    /// How long a `wait` action sleeps
    wait_duration: Duration,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl ActionExecutor {
    pub fn new(wait_duration: Duration) -> Self {
        Self { wait_duration }
    }

    /// Execute `action` on `device`, returning the transport's success flag
    pub async fn execute<D>(&self, device: &mut D, action: &Action) -> bool
    where
        D: DeviceTransport + ?Sized,
    {
        match action {
            Action::Tap { text } => {
                info!(text = %text, "Tapping element");
                device.tap(text).await
            }
            Action::TapPoint { x, y } => {
                info!(x, y, "Tapping point");
                device.tap_point(*x, *y).await
            }
            Action::Input { text } => {
                info!(text = %text, "Entering text");
                device.input(text).await
            }
            Action::Back => {
                info!("Pressing back button");
                device.back().await
            }
            Action::Swipe { direction } => match direction.parse::<SwipeDirection>() {
                Ok(direction) => {
                    info!(direction = %direction, "Swiping");
                    device.swipe(direction).await
                }
                Err(e) => {
                    warn!(error = %e, "Swipe rejected");
                    false
                }
            },
            Action::Wait => {
                info!(wait_ms = self.wait_duration.as_millis() as u64, "Waiting for UI to settle");
                tokio::time::sleep(self.wait_duration).await;
                true
            }
            Action::Done => {
                info!("Goal achieved, no device action");
                true
            }
            Action::Unrecognized { kind, value } => {
                warn!(kind = %kind, value = ?value, "Unknown action type");
                false
            }
        }
    }
}
