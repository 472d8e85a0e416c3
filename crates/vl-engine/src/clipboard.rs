//! Clipboard image capture.
//!
//! Backends write the current clipboard image to a caller-chosen path as PNG.
//! "No image on the clipboard" is an ordinary outcome (`Ok(false)`), not an
//! error; the pipeline decides whether that matters.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use vl_contracts::Provenance;

use crate::artifacts::{AcquiredImage, TempArtifacts};

pub trait ClipboardCapture: Send + Sync {
    fn name(&self) -> &str;

    /// Writes the clipboard image to `dest` as PNG. Returns `Ok(false)` when
    /// the clipboard holds no image.
    fn capture_png(&self, dest: &Path) -> Result<bool>;
}

/// Captures the clipboard into a fresh `clipboard_<timestamp>.png` artifact.
///
/// Any backend failure is logged and reported as `None`, the same as an
/// empty clipboard.
pub fn capture_clipboard(
    backend: &dyn ClipboardCapture,
    artifacts: &TempArtifacts,
) -> Option<AcquiredImage> {
    let path = match artifacts.allocate("clipboard", None, "png") {
        Ok(path) => path,
        Err(err) => {
            log::warn!("cannot reserve clipboard capture file: {err}");
            return None;
        }
    };

    match backend.capture_png(&path) {
        Ok(true) if has_content(&path) => {
            log::info!("captured clipboard image via {} to {}", backend.name(), path.display());
            Some(AcquiredImage::temporary(path, Provenance::Clipboard))
        }
        Ok(_) => {
            log::info!("clipboard holds no image ({})", backend.name());
            artifacts.discard(&path);
            None
        }
        Err(err) => {
            log::warn!("clipboard capture via {} failed: {err:#}", backend.name());
            artifacts.discard(&path);
            None
        }
    }
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}

/// Shells out to the platform's clipboard tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandClipboard;

impl ClipboardCapture for CommandClipboard {
    fn name(&self) -> &str {
        "command"
    }

    #[cfg(target_os = "macos")]
    fn capture_png(&self, dest: &Path) -> Result<bool> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(applescript_capture(dest))
            .output()
            .context("failed to run osascript")?;
        if !output.status.success() {
            anyhow::bail!(
                "osascript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn capture_png(&self, dest: &Path) -> Result<bool> {
        let mut command = if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            let mut command = Command::new("wl-paste");
            command.args(["--no-newline", "--type", "image/png"]);
            command
        } else {
            let mut command = Command::new("xclip");
            command.args(["-selection", "clipboard", "-t", "image/png", "-o"]);
            command
        };
        let output = command.output().context("failed to run clipboard tool")?;
        if !output.status.success() || output.stdout.is_empty() {
            return Ok(false);
        }
        if image::guess_format(&output.stdout).ok() != Some(ImageFormat::Png) {
            return Ok(false);
        }
        fs::write(dest, &output.stdout)
            .with_context(|| format!("failed writing {}", dest.display()))?;
        Ok(true)
    }

    #[cfg(windows)]
    fn capture_png(&self, dest: &Path) -> Result<bool> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-STA", "-Command"])
            .arg(powershell_capture(dest))
            .output()
            .context("failed to run powershell")?;
        if !output.status.success() {
            anyhow::bail!(
                "powershell exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "ok")
    }

    #[cfg(not(any(unix, windows)))]
    fn capture_png(&self, _dest: &Path) -> Result<bool> {
        Ok(false)
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_capture(dest: &Path) -> String {
    let target = applescript_quote(&dest.to_string_lossy());
    format!(
        "try
  set pngData to (the clipboard as «class PNGf»)
  set outFile to open for access POSIX file \"{target}\" with write permission
  set eof of outFile to 0
  write pngData to outFile
  close access outFile
  return \"{target}\"
on error
  try
    close access POSIX file \"{target}\"
  end try
  return \"\"
end try"
    )
}

#[cfg_attr(not(windows), allow(dead_code))]
fn powershell_capture(dest: &Path) -> String {
    let target = dest.to_string_lossy().replace('\'', "''");
    format!(
        "Add-Type -AssemblyName System.Windows.Forms; Add-Type -AssemblyName System.Drawing; \
         $img = [System.Windows.Forms.Clipboard]::GetImage(); \
         if ($img -ne $null) {{ $img.Save('{target}', [System.Drawing.Imaging.ImageFormat]::Png); 'ok' }}"
    )
}

fn applescript_quote(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Reads clipboard pixels in-process through `arboard`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboard;

impl ClipboardCapture for ArboardClipboard {
    fn name(&self) -> &str {
        "arboard"
    }

    fn capture_png(&self, dest: &Path) -> Result<bool> {
        let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
        let image_data = match clipboard.get_image() {
            Ok(image_data) => image_data,
            Err(arboard::Error::ContentNotAvailable) => return Ok(false),
            Err(err) => return Err(err).context("failed reading clipboard image"),
        };
        let width = u32::try_from(image_data.width).context("clipboard image too wide")?;
        let height = u32::try_from(image_data.height).context("clipboard image too tall")?;
        let image = RgbaImage::from_raw(width, height, image_data.bytes.into_owned())
            .context("clipboard image buffer has unexpected length")?;
        image
            .save_with_format(dest, ImageFormat::Png)
            .with_context(|| format!("failed to save {}", dest.display()))?;
        Ok(true)
    }
}

/// Tries each backend in order and stops at the first that yields an image.
pub struct SystemClipboard {
    backends: Vec<Box<dyn ClipboardCapture>>,
}

impl SystemClipboard {
    pub fn new(backends: Vec<Box<dyn ClipboardCapture>>) -> Self {
        Self { backends }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new(vec![Box::new(CommandClipboard), Box::new(ArboardClipboard)])
    }
}

impl ClipboardCapture for SystemClipboard {
    fn name(&self) -> &str {
        "system"
    }

    fn capture_png(&self, dest: &Path) -> Result<bool> {
        let mut reported_empty = false;
        let mut last_err = None;
        for backend in &self.backends {
            match backend.capture_png(dest) {
                Ok(true) if has_content(dest) => return Ok(true),
                Ok(_) => reported_empty = true,
                Err(err) => {
                    log::debug!("clipboard backend {} failed: {err:#}", backend.name());
                    last_err = Some(err);
                }
            }
        }
        // An error only matters when no backend could say the clipboard is empty.
        match last_err {
            Some(err) if !reported_empty => Err(err),
            _ => Ok(false),
        }
    }
}
