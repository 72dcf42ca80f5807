//! Host setup checks: tools on PATH and a reachable device

use std::time::Duration;

use tokio::process::Command;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single setup check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
    /// What to do when the check fails
    pub hint: &'static str,
}

/// Run every check in order
pub async fn run_checks() -> Vec<CheckResult> {
    let mut results = Vec::new();

    let adb_on_path = which::which("adb").is_ok();
    results.push(CheckResult {
        name: "adb",
        ok: adb_on_path,
        detail: if adb_on_path { "installed" } else { "not installed" }.to_string(),
        hint: "Install the Android SDK Platform Tools",
    });

    let (ok, detail) = match capture_stdout("adb", &["devices"]).await {
        Ok(stdout) => match first_device(&stdout) {
            Some(serial) => (true, format!("connected: {}", serial)),
            None => (false, "no device connected".to_string()),
        },
        Err(e) => (false, e),
    };
    results.push(CheckResult {
        name: "device",
        ok,
        detail,
        hint: "Connect a device over USB or start an emulator",
    });

    let (ok, detail) = match capture_stdout("maestro", &["--version"]).await {
        Ok(version) => (true, version.trim().to_string()),
        Err(e) => (false, e),
    };
    results.push(CheckResult {
        name: "maestro",
        ok,
        detail,
        hint: "Install from https://maestro.mobile.dev",
    });

    results
}

/// Serial of the first device in `adb devices` output that is ready
pub fn first_device(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            match (cols.next(), cols.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .next()
}

async fn capture_stdout(program: &str, args: &[&str]) -> Result<String, String> {
    let output = tokio::time::timeout(CHECK_TIMEOUT, Command::new(program).args(args).output())
        .await
        .map_err(|_| format!("{} timed out", program))?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => "not installed".to_string(),
            _ => e.to_string(),
        })?;

    if !output.status.success() {
        return Err(format!("{} exited with {}", program, output.status));
    }

    // maestro prints its version on stderr on some releases
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    } else {
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_device() {
        let out = "List of devices attached\nemulator-5554\tdevice\n\n";
        assert_eq!(first_device(out), Some("emulator-5554".to_string()));
    }

    #[test]
    fn test_unready_devices_skipped() {
        let out = "List of devices attached\nR58M\tunauthorized\nZY22\toffline\nabc\tdevice\n";
        assert_eq!(first_device(out), Some("abc".to_string()));
        assert_eq!(first_device("List of devices attached\n"), None);
    }
}
