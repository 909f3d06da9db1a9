//! macOS executor built on `open`, `screencapture` and AppleScript

use crate::core::error::{Result, VoxError};
use crate::core::types::Platform;
use crate::platform::{run_command, screenshot_path, PlatformExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Spoken app names mapped to macOS application bundles
const APP_NAMES: &[(&str, &str)] = &[
    ("chrome", "Google Chrome"),
    ("firefox", "Firefox"),
    ("safari", "Safari"),
    ("calculator", "Calculator"),
    ("textedit", "TextEdit"),
    ("notepad", "TextEdit"),
    ("finder", "Finder"),
    ("explorer", "Finder"),
    ("terminal", "Terminal"),
    ("mail", "Mail"),
    ("email", "Mail"),
    ("calendar", "Calendar"),
    ("notes", "Notes"),
    ("word", "Microsoft Word"),
    ("excel", "Microsoft Excel"),
    ("outlook", "Microsoft Outlook"),
];

pub struct MacExecutor {
    screenshot_dir: PathBuf,
}

impl MacExecutor {
    pub fn new(screenshot_dir: PathBuf) -> Self {
        Self { screenshot_dir }
    }

    /// Application name passed to `open -a`
    pub fn application_name(name: &str) -> String {
        let lower = name.trim().to_lowercase();
        APP_NAMES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, app)| app.to_string())
            .unwrap_or_else(|| name.trim().to_string())
    }
}

/// Quote `text` for an AppleScript string literal
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

async fn osascript(script: &str) -> Result<String> {
    run_command("osascript", &["-e", script]).await
}

#[async_trait]
impl PlatformExecutor for MacExecutor {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn open_app(&self, name_or_path: &str) -> Result<()> {
        if Path::new(name_or_path).exists() {
            tracing::info!("Opening {} with its default application", name_or_path);
            run_command("open", &[name_or_path]).await?;
        } else {
            let app = Self::application_name(name_or_path);
            tracing::info!("Opening application {}", app);
            run_command("open", &["-a", &app]).await?;
        }
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        tracing::info!("Opening URL {}", url);
        run_command("open", &[url]).await?;
        Ok(())
    }

    async fn take_screenshot(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let path = screenshot_path(&self.screenshot_dir);
        let target = path.to_string_lossy().to_string();
        run_command("screencapture", &["-x", &target]).await?;
        if !path.exists() {
            return Err(VoxError::Executor(
                "screencapture produced no file (screen recording permission?)".into(),
            ));
        }
        tracing::info!("Screenshot saved: {}", path.display());
        Ok(path)
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        let script = format!(
            "tell application \"System Events\" to keystroke {}",
            applescript_string(text)
        );
        osascript(&script).await?;
        Ok(())
    }

    async fn click_at(&self, x: i32, y: i32) -> Result<()> {
        let script = format!("tell application \"System Events\" to click at {{{}, {}}}", x, y);
        osascript(&script).await?;
        Ok(())
    }

    async fn active_window(&self) -> Result<String> {
        osascript(
            "tell application \"System Events\" to get name of first application process whose frontmost is true",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_name_aliases() {
        assert_eq!(MacExecutor::application_name("chrome"), "Google Chrome");
        assert_eq!(MacExecutor::application_name("Calculator"), "Calculator");
        assert_eq!(MacExecutor::application_name("notepad"), "TextEdit");
        assert_eq!(MacExecutor::application_name("Xcode"), "Xcode");
    }

    #[test]
    fn test_applescript_string_escapes_quotes() {
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
    }
}
