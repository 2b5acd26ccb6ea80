//! Converts the previewed `.webp` file to PNG with an external `ffmpeg`.
//!
//! The converted file replaces the original in the listing and inherits its
//! assignment, so triage continues as if the file had always been a PNG.

use crate::plugin::{Plugin, PluginError, PluginInfo, PluginResult};
use crate::session::{HostContext, Panel, SessionEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Registry name of this plugin.
pub const ENTRY_POINT: &str = "webp_to_png";

/// The panel action that performs the conversion.
pub const CONVERT_ACTION: &str = "convert";

pub fn create() -> Box<dyn Plugin> {
    Box::new(WebpToPng::default())
}

pub struct WebpToPng {
    ffmpeg: PathBuf,
    enabled: bool,
}

impl Default for WebpToPng {
    fn default() -> Self {
        Self::with_ffmpeg("ffmpeg")
    }
}

impl WebpToPng {
    /// Uses the given ffmpeg binary instead of the one on `PATH`.
    pub fn with_ffmpeg(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            enabled: false,
        }
    }

    /// Whether the current file can be converted.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn update(&mut self, ctx: &dyn HostContext) {
        self.enabled = ctx.current_file().is_some_and(is_webp);
    }

    fn convert(&mut self, ctx: &mut dyn HostContext) -> PluginResult<()> {
        let Some(current) = ctx.current_file().map(Path::to_path_buf) else {
            info!("No files to convert");
            return Ok(());
        };
        if !is_webp(&current) {
            return Err(PluginError::Action(format!(
                "Can't convert {} to png: not a .webp file",
                current.display()
            )));
        }

        let converted = png_path(&current);
        if converted.exists() {
            return Err(PluginError::Action(format!(
                "Can't convert {}: {} already exists",
                current.display(),
                converted.display()
            )));
        }
        let status = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(&current)
            .arg("-y")
            .arg(&converted)
            .output()
            .map_err(|e| {
                PluginError::Action(format!("Failed to run {}: {}", self.ffmpeg.display(), e))
            })?;
        if !status.status.success() {
            return Err(PluginError::Action(format!(
                "ffmpeg failed on {}: {}",
                current.display(),
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }

        if let Err(e) = fs::remove_file(&current) {
            warn!(file = %current.display(), error = %e, "could not remove converted original");
        }

        let index = ctx.current_index();
        ctx.set_file_at(index, converted.clone())?;
        if let Some(destination) = ctx.unassign(&current) {
            ctx.assign(&converted, &destination)?;
        }
        ctx.request_reload();

        info!(from = %current.display(), to = %converted.display(), "converted webp to png");
        Ok(())
    }
}

impl Plugin for WebpToPng {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "Webp to PNG conversion".to_string(),
            description: "Converts the currently viewed .webp file into png format using FFMPEG. Requires FFMPEG in path".to_string(),
        }
    }

    fn init(&mut self, ctx: &mut dyn HostContext) -> PluginResult<()> {
        let info = self.info();
        ctx.register_panel(Panel {
            plugin: ENTRY_POINT.to_string(),
            title: info.name,
            description: info.description,
            actions: vec![CONVERT_ACTION.to_string()],
        });
        self.update(ctx);
        Ok(())
    }

    fn on_event(&mut self, event: SessionEvent, ctx: &mut dyn HostContext) {
        if matches!(event, SessionEvent::SourcesChanged | SessionEvent::FullReload) {
            self.update(ctx);
        }
    }

    fn invoke(&mut self, action: &str, ctx: &mut dyn HostContext) -> PluginResult<()> {
        match action {
            CONVERT_ACTION => self.convert(ctx),
            _ => Err(PluginError::UnknownAction {
                plugin: ENTRY_POINT.to_string(),
                action: action.to_string(),
            }),
        }
    }
}

fn is_webp(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "webp")
}

/// `photo.webp` becomes `photo.png` in the same folder.
fn png_path(path: &Path) -> PathBuf {
    path.with_extension("png")
}
