//! Launching and terminating the Firefox process.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use iris_core::config::FirefoxConfig;
use log::{debug, info, warn};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::error::SessionError;

const POLL_DELAY: Duration = Duration::from_millis(100);

/// Preferences the debugger server needs; written into the profile before
/// launch so no prompt blocks the connection.
const REQUIRED_PREFS: &[(&str, &str)] = &[
    ("devtools.debugger.remote-enabled", "true"),
    ("devtools.debugger.prompt-connection", "false"),
    ("devtools.chrome.enabled", "true"),
    ("toolkit.telemetry.reportingpolicy.firstRun", "false"),
];

/// A launched browser: the child process plus the temporary profile that
/// must outlive it.
pub struct LaunchedFirefox {
    pub child: Option<Child>,
    /// Present only for bridge-created profiles; removed during cleanup.
    pub profile: Option<TempDir>,
    pub port: u16,
}

fn default_executable() -> PathBuf {
    #[cfg(target_os = "macos")]
    return PathBuf::from("/Applications/Firefox.app/Contents/MacOS/firefox");
    #[cfg(target_os = "windows")]
    return PathBuf::from(r"C:\Program Files\Mozilla Firefox\firefox.exe");
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    return PathBuf::from("firefox");
}

fn write_prefs(profile_dir: &std::path::Path) -> Result<(), SessionError> {
    let mut user_js = String::new();
    for (name, value) in REQUIRED_PREFS {
        user_js.push_str(&format!("user_pref(\"{name}\", {value});\n"));
    }
    std::fs::write(profile_dir.join("user.js"), user_js)
        .map_err(|e| SessionError::Launch(format!("writing profile prefs: {e}")))
}

/// Start Firefox with its debugger server listening on `port`.
pub fn launch_firefox(config: &FirefoxConfig, port: u16) -> Result<LaunchedFirefox, SessionError> {
    let executable = config
        .executable_path
        .clone()
        .unwrap_or_else(default_executable);

    let (profile_path, profile) = match &config.profile_dir {
        Some(dir) => (dir.clone(), None),
        None => {
            let tmp = TempDir::with_prefix("iris-profile-")
                .map_err(|e| SessionError::Launch(format!("creating profile dir: {e}")))?;
            (tmp.path().to_path_buf(), Some(tmp))
        },
    };
    write_prefs(&profile_path)?;

    let mut args = vec![
        "-start-debugger-server".to_string(),
        port.to_string(),
        "-profile".to_string(),
        profile_path.to_string_lossy().into_owned(),
        "-no-remote".to_string(),
    ];
    args.extend(config.args.clone());

    info!("Launching {} with args {:?}", executable.display(), args);
    let child = Command::new(&executable)
        .args(&args)
        .kill_on_drop(false)
        .spawn()
        .map_err(|e| SessionError::Launch(format!("{}: {e}", executable.display())))?;

    Ok(LaunchedFirefox {
        child: Some(child),
        profile,
        port,
    })
}

/// Poll until the debugger server accepts connections, up to `timeout`.
pub async fn wait_for_socket(host: &str, port: u16, timeout: Duration) -> Result<(), SessionError> {
    let deadline = Instant::now() + timeout;
    let address = format!("{host}:{port}");
    loop {
        match TcpStream::connect(&address).await {
            Ok(_probe) => {
                debug!("Debugger server is up on {address}");
                return Ok(());
            },
            Err(_) if Instant::now() < deadline => {
                tokio::time::sleep(POLL_DELAY).await;
            },
            Err(e) => {
                return Err(SessionError::Timeout(format!(
                    "waiting for debugger server on {address}: {e}"
                )));
            },
        }
    }
}

/// Ask the child to die and wait up to `timeout` for it. Returns whether the
/// process is known to be gone.
pub async fn terminate_child(child: &mut Child, timeout: Duration) -> bool {
    if let Err(e) = child.start_kill() {
        warn!("Failed to signal the browser process: {e}");
        return false;
    }
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            info!("Browser process exited with {status}");
            true
        },
        Ok(Err(e)) => {
            warn!("Waiting for the browser process failed: {e}");
            false
        },
        Err(_) => {
            warn!("Browser process did not exit within {timeout:?}");
            false
        },
    }
}

/// Remove the temporary profile after the grace period. Never fatal; a
/// lingering directory only wastes disk.
pub async fn cleanup_profile(profile: TempDir, grace: Duration) {
    tokio::time::sleep(grace).await;
    let path = profile.path().to_path_buf();
    if let Err(e) = profile.close() {
        warn!("Could not remove temporary profile {}: {e}", path.display());
    } else {
        debug!("Removed temporary profile {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_socket_times_out_when_nothing_listens() {
        // Bind-then-drop to get a port that is almost certainly closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = wait_for_socket("127.0.0.1", port, Duration::from_millis(300)).await;
        assert!(matches!(result, Err(SessionError::Timeout(_))));
    }

    #[tokio::test]
    async fn wait_for_socket_succeeds_once_listening() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });
        wait_for_socket("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[test]
    fn prefs_file_contains_required_switches() {
        let dir = TempDir::new().unwrap();
        write_prefs(dir.path()).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("user.js")).unwrap();
        assert!(contents.contains("devtools.debugger.remote-enabled\", true"));
        assert!(contents.contains("devtools.debugger.prompt-connection\", false"));
    }
}
