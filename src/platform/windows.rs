//! Windows executor built on `cmd start` and PowerShell

use crate::core::error::{Result, VoxError};
use crate::core::types::Platform;
use crate::platform::{run_command, screenshot_path, PlatformExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Spoken app names mapped to executables
const APP_COMMANDS: &[(&str, &str)] = &[
    ("chrome", "chrome"),
    ("firefox", "firefox"),
    ("notepad", "notepad"),
    ("calculator", "calc"),
    ("word", "winword"),
    ("excel", "excel"),
    ("powerpoint", "powerpnt"),
    ("outlook", "outlook"),
    ("explorer", "explorer"),
    ("email", "outlook"),
];

const SCREENSHOT_SCRIPT: &str = r#"Add-Type -AssemblyName System.Windows.Forms,System.Drawing
$b = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds
$bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height
$g = [System.Drawing.Graphics]::FromImage($bmp)
$g.CopyFromScreen($b.Location, [System.Drawing.Point]::Empty, $b.Size)
$bmp.Save('{path}', [System.Drawing.Imaging.ImageFormat]::Png)
$g.Dispose(); $bmp.Dispose()"#;

const CLICK_SCRIPT: &str = r#"Add-Type -MemberDefinition '[DllImport("user32.dll")] public static extern bool SetCursorPos(int x, int y); [DllImport("user32.dll")] public static extern void mouse_event(int f, int x, int y, int d, int e);' -Name Mouse -Namespace Vox
[Vox.Mouse]::SetCursorPos({x}, {y}) | Out-Null
[Vox.Mouse]::mouse_event(0x0002, 0, 0, 0, 0)
[Vox.Mouse]::mouse_event(0x0004, 0, 0, 0, 0)"#;

pub struct WindowsExecutor {
    screenshot_dir: PathBuf,
}

impl WindowsExecutor {
    pub fn new(screenshot_dir: PathBuf) -> Self {
        Self { screenshot_dir }
    }

    /// Executable launched for a spoken app name
    pub fn command_name(name: &str) -> String {
        let lower = name.trim().to_lowercase();
        APP_COMMANDS
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, command)| command.to_string())
            .unwrap_or_else(|| name.trim().to_string())
    }
}

/// Characters cmd.exe treats as command separators, redirections or escapes
const CMD_METACHARACTERS: &[char] = &['&', '|', '<', '>', '^', '%', '"', '\n', '\r'];

/// Reject names cmd.exe would split into more than one command
fn validate_command_name(command: &str) -> Result<()> {
    if command.is_empty() {
        return Err(VoxError::Executor("No application name given".into()));
    }
    if let Some(c) = command.chars().find(|c| CMD_METACHARACTERS.contains(c)) {
        return Err(VoxError::Executor(format!(
            "Refusing to launch \"{}\": contains '{}'",
            command,
            c.escape_default()
        )));
    }
    Ok(())
}

/// Quote for a single-quoted PowerShell string
fn ps_quote(text: &str) -> String {
    text.replace('\'', "''")
}

/// Escape characters SendKeys treats as modifiers or groups
fn sendkeys_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '+' | '^' | '%' | '~' | '(' | ')' | '{' | '}' | '[' | ']' => {
                out.push('{');
                out.push(c);
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    out
}

async fn powershell(script: &str) -> Result<String> {
    run_command("powershell", &["-NoProfile", "-NonInteractive", "-Command", script]).await
}

#[async_trait]
impl PlatformExecutor for WindowsExecutor {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn open_app(&self, name_or_path: &str) -> Result<()> {
        // existing files go to the shell handler verbatim, never through cmd
        if Path::new(name_or_path.trim()).exists() {
            tracing::info!("Opening {}", name_or_path);
            run_command("rundll32", &["url.dll,FileProtocolHandler", name_or_path.trim()]).await?;
            return Ok(());
        }

        let command = Self::command_name(name_or_path);
        validate_command_name(&command)?;
        tracing::info!("Opening {}", command);
        match run_command("cmd", &["/C", "start", "", &command]).await {
            Ok(_) => Ok(()),
            Err(start_err) => {
                tracing::warn!("start failed ({}), launching {}.exe directly", start_err, command);
                tokio::process::Command::new(format!("{}.exe", command))
                    .spawn()
                    .map(|_| ())
                    .map_err(|e| VoxError::Executor(format!("Failed to open {}: {}", name_or_path, e)))
            }
        }
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        tracing::info!("Opening URL {}", url);
        // rundll32 takes the URL verbatim; cmd would split it on '&'
        run_command("rundll32", &["url.dll,FileProtocolHandler", url]).await?;
        Ok(())
    }

    async fn take_screenshot(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let path = screenshot_path(&self.screenshot_dir);
        let script = SCREENSHOT_SCRIPT.replace("{path}", &ps_quote(&path.to_string_lossy()));
        powershell(&script).await?;
        tracing::info!("Screenshot saved: {}", path.display());
        Ok(path)
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        let script = format!(
            "Add-Type -AssemblyName System.Windows.Forms; [System.Windows.Forms.SendKeys]::SendWait('{}')",
            ps_quote(&sendkeys_escape(text))
        );
        powershell(&script).await?;
        Ok(())
    }

    async fn click_at(&self, x: i32, y: i32) -> Result<()> {
        let script = CLICK_SCRIPT
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string());
        powershell(&script).await?;
        Ok(())
    }

    async fn active_window(&self) -> Result<String> {
        powershell(
            "Get-Process | Where-Object {$_.MainWindowTitle -ne ''} | Select-Object -First 1 -ExpandProperty MainWindowTitle",
        )
        .await
    }
}
