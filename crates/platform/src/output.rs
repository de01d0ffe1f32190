//! Where merged videos are written.

use std::path::{Path, PathBuf};

use vidjoin_common::config::VidjoinConfig;
use vidjoin_common::error::{MergeError, MergeResult};

/// Supplies a directory the process may write merged videos into.
pub trait OutputDirProvider {
    fn output_dir(&self) -> MergeResult<PathBuf>;
}

/// A fixed directory, created on first use.
#[derive(Debug, Clone)]
pub struct ConfiguredOutputDir {
    dir: PathBuf,
}

impl ConfiguredOutputDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &VidjoinConfig) -> Self {
        Self::new(&config.output_dir)
    }
}

impl OutputDirProvider for ConfiguredOutputDir {
    fn output_dir(&self) -> MergeResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MergeError::config(format!(
                "Cannot create output directory {}: {e}",
                self.dir.display()
            ))
        })?;
        Ok(self.dir.clone())
    }
}

/// `file_name` inside the provider's directory.
pub fn output_path_in(provider: &dyn OutputDirProvider, file_name: &str) -> MergeResult<PathBuf> {
    let name = Path::new(file_name);
    if file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
        return Err(MergeError::invalid_argument(format!(
            "Output file name must be a bare file name, got '{file_name}'"
        )));
    }
    Ok(provider.output_dir()?.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidjoin_common::config::DEFAULT_OUTPUT_FILE_NAME;
    use vidjoin_common::error::ErrorCode;

    #[test]
    fn test_output_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let provider = ConfiguredOutputDir::new(root.path().join("vidjoin").join("merged"));

        let path = output_path_in(&provider, DEFAULT_OUTPUT_FILE_NAME).unwrap();
        assert_eq!(
            path,
            root.path().join("vidjoin").join("merged").join("mergedVideo.mp4")
        );
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_file_name_must_not_escape_dir() {
        let root = tempfile::tempdir().unwrap();
        let provider = ConfiguredOutputDir::new(root.path());

        for bad in ["", "../up.mp4", "nested/out.mp4", ".."] {
            let err = output_path_in(&provider, bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidArgument, "{bad}");
        }
    }

    #[test]
    fn test_blocked_dir_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let err = ConfiguredOutputDir::new(file.join("sub")).output_dir().unwrap_err();
        assert_eq!(err.code(), ErrorCode::MergeFailed);
    }
}
