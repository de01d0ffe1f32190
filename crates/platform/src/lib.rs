//! vidjoin Platform
//!
//! Host-facing collaborators of a merge: turning picker results into paths,
//! checking storage access, and choosing where output goes.

pub mod output;
pub mod permissions;
pub mod picker;

pub use output::{output_path_in, ConfiguredOutputDir, OutputDirProvider};
pub use permissions::{
    check_capabilities, ensure_granted, print_capability_report, Capability,
    FilesystemPermissionGate, PermissionGate, PermissionStatus,
};
pub use picker::{resolve_picked, MediaKind, PickedMedia};
