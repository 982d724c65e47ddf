//! A single-process, flat-namespace file system on top of a fixed-size block
//! device. Metadata lives in a super block, a FAT-style allocation table and a
//! fixed-capacity directory; open files are tracked in a descriptor table.

pub mod disk;
pub mod fs;
pub mod utils;

pub use fs::{
    config::FsConfig,
    error::{FsError, Result},
    fd_table::Fd,
    FileInfo, FileSystem, Usage, VolumeInfo,
};
