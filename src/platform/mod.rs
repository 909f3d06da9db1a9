//! Host operating system capabilities
//!
//! One [`PlatformExecutor`] trait, two implementations. The executor is picked
//! once at startup by [`select_executor`]. File operations are OS-independent
//! and come from the trait's default methods.

pub mod files;
pub mod macos;
pub mod windows;

use crate::core::config::PathsConfig;
use crate::core::error::{Result, VoxError};
use crate::core::types::Platform;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use macos::MacExecutor;
pub use windows::WindowsExecutor;

/// Side-effecting operations on the host. Every method may fail with
/// `VoxError::Executor` or `VoxError::IoError`; callers wrap, never propagate.
#[async_trait]
pub trait PlatformExecutor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Launch an application by alias, name or path
    async fn open_app(&self, name_or_path: &str) -> Result<()>;

    /// Open a URL in the default browser
    async fn open_url(&self, url: &str) -> Result<()>;

    /// Capture the screen, returning the saved image path
    async fn take_screenshot(&self) -> Result<PathBuf>;

    async fn send_keys(&self, text: &str) -> Result<()>;

    async fn click_at(&self, x: i32, y: i32) -> Result<()>;

    /// Title or process name of the focused window
    async fn active_window(&self) -> Result<String>;

    async fn read_dir(&self, dir: &Path) -> Result<Vec<String>> {
        files::read_dir(dir).await
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        files::write_file(path, contents).await
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        files::delete_file(path).await
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<()> {
        files::copy_file(source, destination).await
    }

    async fn move_file(&self, source: &Path, destination: &Path) -> Result<()> {
        files::move_file(source, destination).await
    }

    /// Files under `root` whose name contains `pattern` (case-insensitive)
    async fn find_files(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        files::find_files(root, pattern).await
    }
}

/// Pick the executor for the running OS
pub fn select_executor(paths: &PathsConfig) -> Arc<dyn PlatformExecutor> {
    let platform = Platform::detect();
    let os = std::env::consts::OS;
    if Platform::has_native_executor(os) {
        tracing::info!("Using {:?} executor", platform);
    } else {
        tracing::warn!(
            "No executor for {}, falling back to the {:?} command set; host actions will likely fail",
            os,
            platform
        );
    }
    match platform {
        Platform::Windows => Arc::new(WindowsExecutor::new(paths.screenshot_dir.clone())),
        Platform::MacOs => Arc::new(MacExecutor::new(paths.screenshot_dir.clone())),
    }
}

/// `<dir>/screenshot-<UTC timestamp>.png`
pub fn screenshot_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    dir.join(format!("screenshot-{}.png", stamp))
}

/// Run a host command to completion, returning trimmed stdout
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    tracing::debug!("Running {} {:?}", program, args);
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| VoxError::Executor(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoxError::Executor(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
