//! Preview sizing and file identification.
//!
//! The preview shows one source file at a time. Its size starts at a fixed
//! base and is scaled by a zoom factor that the user can step up or down; the
//! factor is what gets persisted. Files are identified by sniffing their
//! content, so a mislabeled extension still previews correctly.
//!
//! # Examples
//!
//! ```
//! use sortling::preview::PreviewSize;
//!
//! let mut size = PreviewSize::default();
//! assert_eq!(size.dimensions(), (400, 400));
//! size.zoom_in();
//! assert_eq!(size.dimensions(), (480, 480));
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;

/// Edge length of the preview at zoom 1.0.
pub const BASE_PREVIEW_EDGE: u32 = 400;

/// Multiplier applied by one zoom step.
pub const ZOOM_STEP: f32 = 1.2;

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;

/// Number of leading bytes read for content sniffing.
const SNIFF_LEN: u64 = 8192;

/// Current preview scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewSize {
    zoom: f32,
}

impl Default for PreviewSize {
    fn default() -> Self {
        Self { zoom: 1.0 }
    }
}

impl PreviewSize {
    /// Creates a preview size from a stored zoom factor, clamped to a sane range.
    pub fn with_zoom(zoom: f32) -> Self {
        let zoom = if zoom.is_finite() { zoom } else { 1.0 };
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_in(&mut self) {
        *self = Self::with_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        *self = Self::with_zoom(self.zoom / ZOOM_STEP);
    }

    /// Preview bounding box in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        let edge = (BASE_PREVIEW_EDGE as f32 * self.zoom).round() as u32;
        (edge, edge)
    }
}

/// What a file looks like to the previewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// A format the previewer can render as a picture.
    Image { mime: String },
    /// A recognized non-image format.
    Other { mime: String },
    /// Content could not be identified.
    Unknown,
}

impl FileKind {
    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::Image { .. })
    }
}

/// Identity and size of a previewed file.
#[derive(Debug, Clone)]
pub struct FileDescription {
    pub kind: FileKind,
    pub size_bytes: u64,
}

/// Sniffs the file at `path` and reports its kind and size.
///
/// Unreadable files are reported as `FileKind::Unknown` with size 0.
pub fn describe(path: &Path) -> FileDescription {
    let size_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let mut head = Vec::new();
    let kind = match fs::File::open(path).and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut head)) {
        Ok(_) => match infer::get(&head) {
            Some(found) if found.matcher_type() == infer::MatcherType::Image => FileKind::Image {
                mime: found.mime_type().to_string(),
            },
            Some(found) => FileKind::Other {
                mime: found.mime_type().to_string(),
            },
            None => FileKind::Unknown,
        },
        Err(_) => FileKind::Unknown,
    };

    FileDescription { kind, size_bytes }
}
