//! Storage permission checks and capability reporting.
//!
//! A merge needs read access to every source and write access to the output
//! directory, plus working ffmpeg and ffprobe binaries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use vidjoin_common::config::VidjoinConfig;
use vidjoin_common::error::{MergeError, MergeResult};

/// Result of a permission check or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    /// Denied, but asking again may succeed.
    Denied,
    /// Denied in a way a request cannot fix.
    Blocked,
    /// The resource does not exist on this system.
    Unavailable,
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Blocked => "blocked",
            Self::Unavailable => "unavailable",
        };
        f.write_str(text)
    }
}

/// Source of the storage permission a merge needs.
#[async_trait::async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(&self) -> PermissionStatus;

    /// Try to obtain the permission.
    async fn request(&self) -> PermissionStatus;
}

/// Grants access when every source is readable and the output directory is
/// writable.
#[derive(Debug, Clone)]
pub struct FilesystemPermissionGate {
    sources: Vec<PathBuf>,
    output_dir: PathBuf,
}

impl FilesystemPermissionGate {
    pub fn new(sources: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            output_dir: output_dir.into(),
        }
    }

    fn evaluate(&self) -> PermissionStatus {
        for source in &self.sources {
            let status = readable(source);
            if status != PermissionStatus::Granted {
                tracing::debug!(path = %source.display(), %status, "Source not readable");
                return status;
            }
        }
        writable_dir(&self.output_dir)
    }
}

#[async_trait::async_trait]
impl PermissionGate for FilesystemPermissionGate {
    async fn check(&self) -> PermissionStatus {
        self.evaluate()
    }

    /// Creates the output directory when it is missing, then re-checks.
    async fn request(&self) -> PermissionStatus {
        if !self.output_dir.exists() {
            if let Err(err) = std::fs::create_dir_all(&self.output_dir) {
                tracing::warn!(
                    dir = %self.output_dir.display(),
                    error = %err,
                    "Could not create output directory"
                );
                return PermissionStatus::Blocked;
            }
        }
        self.evaluate()
    }
}

/// Succeed only once `gate` reports [`PermissionStatus::Granted`], requesting if needed.
pub async fn ensure_granted(gate: &dyn PermissionGate) -> MergeResult<()> {
    let status = match gate.check().await {
        PermissionStatus::Granted => return Ok(()),
        PermissionStatus::Denied | PermissionStatus::Unavailable => gate.request().await,
        PermissionStatus::Blocked => PermissionStatus::Blocked,
    };
    match status {
        PermissionStatus::Granted => Ok(()),
        other => Err(MergeError::invalid_argument(format!("Storage permission {other}"))),
    }
}

fn readable(path: &Path) -> PermissionStatus {
    match std::fs::File::open(path) {
        Ok(_) => PermissionStatus::Granted,
        Err(err) => match err.kind() {
            std::io::ErrorKind::NotFound => PermissionStatus::Unavailable,
            std::io::ErrorKind::PermissionDenied => PermissionStatus::Blocked,
            _ => PermissionStatus::Denied,
        },
    }
}

fn writable_dir(dir: &Path) -> PermissionStatus {
    if !dir.is_dir() {
        return PermissionStatus::Denied;
    }
    match tempfile::Builder::new()
        .prefix(".vidjoin-write-check")
        .tempfile_in(dir)
    {
        Ok(_) => PermissionStatus::Granted,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => PermissionStatus::Blocked,
        Err(_) => PermissionStatus::Denied,
    }
}

/// Something vidjoin needs from the host system.
#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Check all capabilities and report status.
pub fn check_capabilities(config: &VidjoinConfig) -> Vec<Capability> {
    vec![
        check_binary(
            "ffmpeg",
            &config.export.ffmpeg_path,
            "Encoder used to render merged videos",
            "VIDJOIN_FFMPEG",
        ),
        check_binary(
            "ffprobe",
            &config.export.ffprobe_path,
            "Probe used to read source durations and tracks",
            "VIDJOIN_FFPROBE",
        ),
        check_output_dir(&config.output_dir),
    ]
}

fn check_binary(name: &str, binary: &Path, description: &str, env_var: &str) -> Capability {
    let available = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    Capability {
        name: name.to_string(),
        description: format!("{description} ({})", binary.display()),
        available,
        required: true,
        fix_instructions: (!available).then(|| {
            format!("Install {name} (sudo apt install ffmpeg) or point {env_var} at the binary")
        }),
    }
}

fn check_output_dir(dir: &Path) -> Capability {
    let status = if dir.exists() {
        writable_dir(dir)
    } else {
        // Missing is fine if it can be created later.
        dir.ancestors()
            .find(|ancestor| ancestor.is_dir())
            .map(writable_dir)
            .unwrap_or(PermissionStatus::Unavailable)
    };
    let available = status == PermissionStatus::Granted;

    Capability {
        name: "Output Directory".to_string(),
        description: format!("Writable location for merged videos ({})", dir.display()),
        available,
        required: false,
        fix_instructions: (!available).then(|| {
            "Set output_dir in the config file or pass --output to merge".to_string()
        }),
    }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("vidjoin System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidjoin_common::error::ErrorCode;

    #[tokio::test]
    async fn test_readable_sources_and_writable_dir_are_granted() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.mp4");
        std::fs::write(&source, b"clip").unwrap();

        let gate = FilesystemPermissionGate::new(vec![source], dir.path());
        assert_eq!(gate.check().await, PermissionStatus::Granted);
        ensure_granted(&gate).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("merged").join("today");

        let gate = FilesystemPermissionGate::new(Vec::new(), &output_dir);
        assert_eq!(gate.check().await, PermissionStatus::Denied);
        assert_eq!(gate.request().await, PermissionStatus::Granted);
        assert!(output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_missing_source_is_not_granted() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FilesystemPermissionGate::new(vec![dir.path().join("gone.mp4")], dir.path());

        assert_eq!(gate.check().await, PermissionStatus::Unavailable);
        let err = ensure_granted(&gate).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_capabilities_flag_missing_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VidjoinConfig {
            output_dir: dir.path().join("out"),
            ..VidjoinConfig::default()
        };
        config.export.ffmpeg_path = PathBuf::from("/nonexistent/ffmpeg");
        config.export.ffprobe_path = PathBuf::from("/nonexistent/ffprobe");

        let caps = check_capabilities(&config);
        assert_eq!(caps.len(), 3);
        assert!(!caps[0].available && caps[0].required);
        assert!(caps[0].fix_instructions.is_some());
        assert!(!caps[1].available);
        assert!(caps[2].available);
    }
}
