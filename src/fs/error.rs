use std::{io, path::PathBuf};

use thiserror::Error;

use crate::fs::fd_table::Fd;

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid file descriptor: {0}")]
    InvalidDescriptor(Fd),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    #[error("File name '{name}' is longer than {max} bytes")]
    NameTooLong { name: String, max: u32 },
    #[error("Directory is full")]
    DirectoryFull,
    #[error("All file descriptors are in use")]
    DescriptorTableFull,
    #[error("File is still open: {0}")]
    Busy(String),
    #[error("No file system is mounted")]
    NotMounted,
    #[error("A file system is already mounted")]
    AlreadyMounted,
    #[error("Backing store {path} is unavailable: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Inconsistent metadata: {0}")]
    InvalidState(String), // 块链比记录的大小短
    #[error("File system corrupted: {0}")]
    Corrupted(String),
    #[error("Disk I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Metadata codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl FsError {
    pub(crate) fn store(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            source,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FsError>;
