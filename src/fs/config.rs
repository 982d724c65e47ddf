use crate::{
    disk::types::DEFAULT_BLOCK_COUNT,
    fs::{
        directory::Directory,
        error::{FsError, Result},
        fat::Fat,
        region::blocks_for,
    },
};

pub const SUPER_BLOCK_ID: u32 = 0;
pub const FAT_START_BLOCK_ID: u32 = 1;

/// 魔数，用于识别文件系统
pub const FS_MAGIC: u64 = 0x464C_4154_4653_0001; // "FLATFS" v1

// 目录最多容纳的文件数
pub const MAX_NUM_FILES: u32 = 64;

// 文件名最大长度（字节）
pub const MAX_NAME_LEN: u32 = 15;

// 文件名在磁盘上的定长字段宽度
pub const NAME_FIELD_LEN: usize = 32;

// 同时打开的文件描述符上限
pub const MAX_NUM_FD: usize = 32;

/// 文件系统的可配置参数
///
/// `max_files` 与 `max_name_len` 在格式化时写入超级块，之后以超级块为准；
/// `max_open_files` 只作用于当前挂载实例。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    pub block_count: u32,
    pub max_files: u32,
    pub max_name_len: u32,
    pub max_open_files: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_count: DEFAULT_BLOCK_COUNT,
            max_files: MAX_NUM_FILES,
            max_name_len: MAX_NAME_LEN,
            max_open_files: MAX_NUM_FD,
        }
    }
}

impl FsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 || self.max_open_files == 0 {
            return Err(FsError::InvalidArgument(
                "file and descriptor limits must be non-zero".to_string(),
            ));
        }
        if self.max_name_len == 0 || self.max_name_len as usize > NAME_FIELD_LEN {
            return Err(FsError::InvalidArgument(format!(
                "max name length must be within 1..={NAME_FIELD_LEN}"
            )));
        }

        // 超级块 + FAT + 目录之后至少还要剩一个数据块
        let (fat_blocks, dir_blocks) = self.metadata_blocks()?;
        let metadata = 1 + u64::from(fat_blocks) + u64::from(dir_blocks);
        if metadata >= u64::from(self.block_count) {
            return Err(FsError::InvalidArgument(format!(
                "{} blocks cannot hold {metadata} metadata blocks and any data",
                self.block_count
            )));
        }
        Ok(())
    }

    /// 按块数和文件数算出 FAT 与目录各占多少块
    pub fn metadata_blocks(&self) -> Result<(u32, u32)> {
        let fat_blocks = blocks_for(Fat::image_len(self.block_count)?);
        let dir_blocks = Directory::region_blocks(self.max_files)?;
        Ok((fat_blocks, dir_blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(block_count: u32) -> FsConfig {
        FsConfig {
            block_count,
            ..FsConfig::default()
        }
    }

    #[test]
    fn default_layout_is_valid() {
        let config = FsConfig::default();
        config.validate().unwrap();
        // 4096 个 5 字节表项 + 长度前缀放得进 6 块，64 个目录项 1 块
        assert_eq!(config.metadata_blocks().unwrap(), (6, 1));
    }

    #[test]
    fn block_count_must_leave_a_data_block() {
        // 超级块、FAT、目录各一块
        assert!(matches!(
            sized(3).validate(),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            sized(0).validate(),
            Err(FsError::InvalidArgument(_))
        ));
        sized(4).validate().unwrap();
    }

    #[test]
    fn limits_are_checked() {
        let wide = FsConfig {
            max_name_len: NAME_FIELD_LEN as u32 + 1,
            ..FsConfig::default()
        };
        assert!(wide.validate().is_err());

        let no_fds = FsConfig {
            max_open_files: 0,
            ..FsConfig::default()
        };
        assert!(no_fds.validate().is_err());
    }
}
