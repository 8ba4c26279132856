use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    #[error("path to the containing directory not found")]
    PathNotFound,
    #[error("entry not found")]
    EntryNotFound,
    #[error("an entry with this name already exists")]
    EntryAlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("no free blocks left on the disk")]
    NoFreeBlocks,
    #[error("name or path is too long")]
    NameTooLong,
    #[error("invalid open mode")]
    InvalidMode,
    #[error("cannot remove the current directory")]
    CannotRemoveCurrentDirectory,
    #[error("cannot ascend above the root directory")]
    CannotAscendAboveRoot,
    #[error("directory has no free entry slot")]
    DirectoryFull,
    #[error("name contains a NUL byte")]
    InvalidName,
    #[error("corrupted file system: {0}")]
    Corrupted(&'static str),
    #[error("invalid disk image: {0}")]
    InvalidImage(&'static str),
    /// Only produced by [`crate::Cache`] implementations, never by file system operations.
    #[error("block not present in cache")]
    CacheMiss,
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, FsError>;
