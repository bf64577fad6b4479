//! Filesystem tools: read, write, patch, directory listing.

pub mod list;
pub mod patch;
pub mod read;
pub mod write;

pub use list::ListDirTool;
pub use patch::PatchFileTool;
pub use read::ReadFileTool;
pub use write::WriteFileTool;
