//! Android transport built on `adb` (screens, keys, gestures) and `maestro`
//! (hierarchy, text taps, text input).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{DeviceTransport, SwipeDirection};

/// Timeout for ordinary device commands
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for `screencap`
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Swipe gesture duration handed to `input swipe`
const SWIPE_DURATION_MS: u32 = 300;

/// Android key code for BACK
const KEYCODE_BACK: &str = "4";

/// Device transport shelling out to `adb` and `maestro`
#[derive(Debug, Default)]
pub struct AdbDriver {
    last_error: Option<String>,
    /// Target a specific device (`adb -s`); `None` uses the only connected one
    serial: Option<String>,
}

impl AdbDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serial(serial: impl Into<String>) -> Self {
        Self {
            last_error: None,
            serial: Some(serial.into()),
        }
    }

    /// Full `adb` argument list, prefixed with `-s <serial>` when set
    fn adb_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push("-s".to_string());
            full.push(serial.clone());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    /// Run a command and return stdout, recording failures in `last_error`
    async fn run(&mut self, program: &str, args: &[&str], timeout: Duration) -> Option<Vec<u8>> {
        debug!(program, ?args, "Running device command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let outcome = tokio::time::timeout(timeout, command.output()).await;
        let error = match outcome {
            Ok(Ok(output)) if output.status.success() => {
                self.last_error = None;
                return Some(output.stdout);
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if stderr.is_empty() {
                    format!("{} failed with {}", program, output.status)
                } else {
                    stderr
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                format!("Command not found: {}", program)
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("Command timed out after {} seconds", timeout.as_secs()),
        };

        warn!(program, error = %error, "Device command failed");
        self.last_error = Some(error);
        None
    }

    async fn adb(&mut self, args: &[&str]) -> bool {
        let args = self.adb_args(args);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run("adb", &args, COMMAND_TIMEOUT).await.is_some()
    }

    async fn maestro(&mut self, args: &[&str]) -> Option<Vec<u8>> {
        self.run("maestro", args, COMMAND_TIMEOUT).await
    }
}

#[async_trait]
impl DeviceTransport for AdbDriver {
    async fn capture(&mut self, path: &Path) -> bool {
        let args = self.adb_args(&["exec-out", "screencap", "-p"]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let Some(png) = self.run("adb", &args, CAPTURE_TIMEOUT).await else {
            return false;
        };
        if png.is_empty() {
            self.last_error = Some("Screenshot failed: empty output".to_string());
            return false;
        }

        match tokio::fs::write(path, &png).await {
            Ok(()) => true,
            Err(e) => {
                let error = format!("Failed to write {}: {}", path.display(), e);
                warn!(error = %error, "Screenshot write failed");
                self.last_error = Some(error);
                false
            }
        }
    }

    async fn hierarchy(&mut self) -> Option<String> {
        self.maestro(&["hierarchy"])
            .await
            .map(|out| String::from_utf8_lossy(&out).into_owned())
    }

    async fn tap(&mut self, text: &str) -> bool {
        self.maestro(&["studio", "tap", text]).await.is_some()
    }

    async fn tap_point(&mut self, x: i64, y: i64) -> bool {
        let (x, y) = (x.to_string(), y.to_string());
        self.maestro(&["studio", "tap", "-x", &x, "-y", &y])
            .await
            .is_some()
    }

    async fn input(&mut self, text: &str) -> bool {
        self.maestro(&["studio", "input", text]).await.is_some()
    }

    async fn back(&mut self) -> bool {
        self.adb(&["shell", "input", "keyevent", KEYCODE_BACK]).await
    }

    async fn swipe(&mut self, direction: SwipeDirection) -> bool {
        let p = direction.path();
        let coords = [p.x1, p.y1, p.x2, p.y2, SWIPE_DURATION_MS as i32].map(|n| n.to_string());
        self.adb(&[
            "shell", "input", "swipe", &coords[0], &coords[1], &coords[2], &coords[3], &coords[4],
        ])
        .await
    }

    async fn launch(&mut self, package: &str) -> bool {
        self.adb(&[
            "shell",
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_prefix() {
        let driver = AdbDriver::with_serial("emulator-5554");
        assert_eq!(
            driver.adb_args(&["shell", "input"]),
            vec!["-s", "emulator-5554", "shell", "input"]
        );
        assert_eq!(AdbDriver::new().adb_args(&["devices"]), vec!["devices"]);
    }

    #[tokio::test]
    async fn test_missing_binary_sets_last_error() {
        let mut driver = AdbDriver::new();
        let out = driver
            .run("ghostbot-no-such-binary", &[], Duration::from_secs(5))
            .await;
        assert!(out.is_none());
        assert!(driver.last_error().unwrap().contains("Command not found"));
    }
}
