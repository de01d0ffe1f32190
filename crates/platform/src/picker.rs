//! Turning media picker results into local file paths.
//!
//! Pickers hand back URIs. Only `file://` URIs (percent-encoded) and plain
//! absolute paths name something the merge pipeline can open.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;

use serde::{Deserialize, Serialize};
use vidjoin_common::error::{MergeError, MergeResult};

/// Broad media category reported by a picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
    Other,
}

impl MediaKind {
    /// Classify a MIME type such as `video/mp4`.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().map(str::to_ascii_lowercase).as_deref() {
            Some("video") => Self::Video,
            Some("image") => Self::Image,
            Some("audio") => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// One entry returned by a media picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedMedia {
    pub uri: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub name: Option<String>,
}

impl PickedMedia {
    pub fn video(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            kind: MediaKind::Video,
            name: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Local path named by this entry.
    pub fn to_path(&self) -> MergeResult<PathBuf> {
        let uri = self.uri.trim();
        if let Some(rest) = uri.strip_prefix("file://") {
            // file:///abs and file://localhost/abs are both local.
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            if !rest.starts_with('/') {
                return Err(MergeError::invalid_argument(format!(
                    "File URI has a remote host: {uri}"
                )));
            }
            let bytes: Vec<u8> = percent_decode_str(rest).collect();
            return Ok(PathBuf::from(OsString::from_vec(bytes)));
        }
        if uri.starts_with('/') {
            return Ok(PathBuf::from(uri));
        }
        Err(MergeError::invalid_argument(format!(
            "Picked media is not a local file: {uri}"
        )))
    }
}

/// Keep the video entries, in order, as local paths.
pub fn resolve_picked(entries: &[PickedMedia]) -> MergeResult<Vec<PathBuf>> {
    let paths = entries
        .iter()
        .filter(|entry| entry.is_video())
        .map(PickedMedia::to_path)
        .collect::<MergeResult<Vec<_>>>()?;

    let skipped = entries.len() - paths.len();
    if skipped > 0 {
        tracing::debug!(skipped, "Ignoring non-video picker entries");
    }
    Ok(paths)
}
