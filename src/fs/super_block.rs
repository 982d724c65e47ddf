use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{FsConfig, FAT_START_BLOCK_ID, FS_MAGIC, NAME_FIELD_LEN, SUPER_BLOCK_ID},
        directory::Directory,
        error::{FsError, Result},
        fat::Fat,
        region::blocks_for,
    },
};

/// 超级块：位于 0 号块，记录 FAT 与目录的位置以及全局用量计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u64, // 魔数，用于识别文件系统
    pub volume_id: [u8; 16],
    pub formatted_at: i64,
    /** 设备信息 */
    pub block_size: u32,
    pub block_count: u32,
    /** FAT 信息 */
    pub fat_start: u32,
    pub fat_blocks: u32,
    /** 目录信息 */
    pub dir_start: u32,
    pub dir_blocks: u32,  // 为目录预留的块数
    pub dir_entries: u32, // 当前目录项个数
    pub max_files: u32,
    pub max_name_len: u32,
    /** 用量计数 */
    pub total_bytes: u64, // 所有文件大小之和
    pub free_blocks: u32, // 数据区空闲块数
}

impl SuperBlock {
    pub fn new(
        config: &FsConfig,
        fat_blocks: u32,
        dir_blocks: u32,
        volume_id: Uuid,
        formatted_at: i64,
    ) -> Self {
        let dir_start = FAT_START_BLOCK_ID + fat_blocks;
        Self {
            magic: FS_MAGIC,
            volume_id: volume_id.into_bytes(),
            formatted_at,
            block_size: BLOCK_SIZE as u32,
            block_count: config.block_count,
            fat_start: FAT_START_BLOCK_ID,
            fat_blocks,
            dir_start,
            dir_blocks,
            dir_entries: 0,
            max_files: config.max_files,
            max_name_len: config.max_name_len,
            total_bytes: 0,
            free_blocks: config.block_count.saturating_sub(dir_start + dir_blocks),
        }
    }

    /// 数据区起始块号，之前的块全部是元数据
    pub fn data_start(&self) -> u32 {
        self.dir_start + self.dir_blocks
    }

    pub fn data_blocks(&self) -> u32 {
        self.block_count - self.data_start()
    }

    /// 所有文件加起来能存下的最大字节数
    pub fn max_total_bytes(&self) -> u64 {
        self.data_blocks() as u64 * BLOCK_SIZE as u64
    }

    pub fn volume_id(&self) -> Uuid {
        Uuid::from_bytes(self.volume_id)
    }

    pub fn load<D: BlockDevice>(disk: &mut D) -> Result<Self> {
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(SUPER_BLOCK_ID, &mut block)?;

        let sb: SuperBlock = bincode::deserialize(&block)
            .map_err(|e| FsError::Corrupted(format!("unreadable super block: {e}")))?;
        sb.check(disk.block_count())?;
        Ok(sb)
    }

    pub fn sync<D: BlockDevice>(&self, disk: &mut D) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        let mut block: Block = [0; BLOCK_SIZE];
        block[..bytes.len()].copy_from_slice(&bytes);
        disk.write_block(SUPER_BLOCK_ID, &block)?;
        Ok(())
    }

    fn check(&self, device_blocks: u32) -> Result<()> {
        if self.magic != FS_MAGIC {
            return Err(FsError::Corrupted(format!(
                "bad magic {:#x}, not a flat-fs volume",
                self.magic
            )));
        }
        if self.block_size as usize != BLOCK_SIZE {
            return Err(FsError::Corrupted(format!(
                "block size {} does not match {BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.block_count != device_blocks {
            return Err(FsError::Corrupted(format!(
                "super block describes {} blocks, device has {device_blocks}",
                self.block_count
            )));
        }
        if self.fat_start != FAT_START_BLOCK_ID
            || self.fat_blocks != blocks_for(Fat::image_len(self.block_count)?)
        {
            return Err(FsError::Corrupted(format!(
                "FAT region {}+{} does not fit {} blocks",
                self.fat_start, self.fat_blocks, self.block_count
            )));
        }
        if self.max_files == 0
            || self.max_name_len == 0
            || self.max_name_len as usize > NAME_FIELD_LEN
        {
            return Err(FsError::Corrupted(format!(
                "bad limits: {} files, names up to {} bytes",
                self.max_files, self.max_name_len
            )));
        }
        if self.dir_start != self.fat_start + self.fat_blocks
            || self.dir_blocks < Directory::region_blocks(self.max_files)?
        {
            return Err(FsError::Corrupted(format!(
                "directory region {}+{} cannot hold {} entries",
                self.dir_start, self.dir_blocks, self.max_files
            )));
        }
        // 用 u64 相加，损坏的 dir_blocks 不能让块号溢出
        if u64::from(self.dir_start) + u64::from(self.dir_blocks) >= u64::from(self.block_count) {
            return Err(FsError::Corrupted("metadata layout out of bounds".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    fn sample() -> SuperBlock {
        let config = FsConfig {
            block_count: 64,
            max_files: 8,
            ..FsConfig::default()
        };
        SuperBlock::new(&config, 1, 1, Uuid::new_v4(), 1_700_000_000)
    }

    #[test]
    fn layout_counters_follow_reservation() {
        let sb = sample();
        assert_eq!(sb.dir_start, 2);
        assert_eq!(sb.data_start(), 3);
        assert_eq!(sb.free_blocks, 61);
        assert_eq!(sb.max_total_bytes(), 61 * BLOCK_SIZE as u64);
    }

    #[test]
    fn survives_block_zero() {
        let mut disk = MemDisk::new(64);
        let mut sb = sample();
        sb.total_bytes = 12345;
        sb.dir_entries = 3;
        sb.sync(&mut disk).unwrap();

        assert_eq!(SuperBlock::load(&mut disk).unwrap(), sb);
    }

    #[test]
    fn blank_device_has_no_super_block() {
        let mut disk = MemDisk::new(64);
        assert!(matches!(
            SuperBlock::load(&mut disk),
            Err(FsError::Corrupted(_))
        ));
    }

    fn assert_rejected(damage: impl FnOnce(&mut SuperBlock)) {
        let mut sb = sample();
        damage(&mut sb);
        let mut disk = MemDisk::new(64);
        sb.sync(&mut disk).unwrap();
        assert!(matches!(
            SuperBlock::load(&mut disk),
            Err(FsError::Corrupted(_))
        ));
    }

    #[test]
    fn name_limit_wider_than_record_is_rejected() {
        assert_rejected(|sb| sb.max_name_len = NAME_FIELD_LEN as u32 + 1);
        assert_rejected(|sb| sb.max_name_len = 0);
    }

    #[test]
    fn file_limit_must_fit_directory_region() {
        assert_rejected(|sb| sb.max_files = 0);
        // 1000 个目录项需要 11 块，这里只预留了 1 块
        assert_rejected(|sb| sb.max_files = 1000);
        assert_rejected(|sb| sb.max_files = u32::MAX);
    }

    #[test]
    fn fat_region_must_match_block_count() {
        assert_rejected(|sb| sb.fat_blocks = 2);
        assert_rejected(|sb| sb.fat_blocks = 0);
        assert_rejected(|sb| sb.fat_start = 2);
    }

    #[test]
    fn directory_region_must_follow_fat_and_stay_on_device() {
        assert_rejected(|sb| sb.dir_start = 3);
        assert_rejected(|sb| sb.dir_blocks = 0);
        assert_rejected(|sb| sb.dir_blocks = 62);
        assert_rejected(|sb| sb.dir_blocks = u32::MAX);
    }

    #[test]
    fn geometry_mismatch_is_rejected() {
        let mut disk = MemDisk::new(64);
        sample().sync(&mut disk).unwrap();

        let mut bigger = MemDisk::new(128);
        let mut block = [0u8; BLOCK_SIZE];
        disk.read_block(0, &mut block).unwrap();
        bigger.write_block(0, &block).unwrap();
        assert!(matches!(
            SuperBlock::load(&mut bigger),
            Err(FsError::Corrupted(_))
        ));
    }
}
