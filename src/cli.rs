use std::path::PathBuf;

use clap::Parser;

use flat_fs::{
    disk::DEFAULT_BLOCK_COUNT,
    fs::config::{FsConfig, MAX_NAME_LEN, MAX_NUM_FD, MAX_NUM_FILES},
};

/// MiniFS: a flat FAT-style file system living inside a disk image
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Disk image to mount; formatted on first use
    #[arg(short, long, default_value = "disk.img")]
    pub image: PathBuf,

    /// Number of 4 KiB blocks when a new image is created
    #[arg(long, default_value_t = DEFAULT_BLOCK_COUNT)]
    pub blocks: u32,

    /// Directory capacity of a newly formatted image
    #[arg(long, default_value_t = MAX_NUM_FILES)]
    pub max_files: u32,

    /// Longest file name accepted by a newly formatted image
    #[arg(long, default_value_t = MAX_NAME_LEN)]
    pub max_name_len: u32,

    /// Number of descriptors that may be open at once
    #[arg(long, default_value_t = MAX_NUM_FD)]
    pub max_open: usize,

    /// Reformat the image even if it already exists
    #[arg(long)]
    pub format: bool,
}

impl Cli {
    pub fn fs_config(&self) -> FsConfig {
        FsConfig {
            block_count: self.blocks,
            max_files: self.max_files,
            max_name_len: self.max_name_len,
            max_open_files: self.max_open,
        }
    }
}
