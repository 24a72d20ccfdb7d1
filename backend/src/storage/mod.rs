//! Repository storage: path resolution and filesystem access.

pub mod filesystem;
pub mod path_resolver;

pub use filesystem::{FileListing, RepositoryFilesystem, TempFile};
pub use path_resolver::{validate_relative_path, PathResolver, RepositoryPaths};
