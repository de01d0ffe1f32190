pub mod check;
pub mod merge;
pub mod plan;
pub mod probe;

use std::path::PathBuf;

use vidjoin_platform::PickedMedia;

/// Accept plain paths and `file://` URIs alike.
pub(crate) fn source_paths(args: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    args.iter()
        .map(|arg| -> anyhow::Result<PathBuf> {
            if arg.contains("://") {
                Ok(PickedMedia::video(arg.as_str()).to_path()?)
            } else {
                Ok(PathBuf::from(arg))
            }
        })
        .collect()
}
