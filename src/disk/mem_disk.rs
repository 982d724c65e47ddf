use std::io::Result;

use crate::disk::{
    block_device::{check_range, BlockDevice},
    types::{Block, BLOCK_SIZE},
};

/// 内存中的块设备，扁平化存储所有块。测试和临时卷使用。
#[derive(Debug, Clone)]
pub struct MemDisk {
    blocks: Vec<u8>,
    block_count: u32,
    writes: u64,
}

impl MemDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: vec![0u8; block_count as usize * BLOCK_SIZE],
            block_count,
            writes: 0,
        }
    }

    /// 累计写块次数
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn span(&self, block_id: u32) -> Result<std::ops::Range<usize>> {
        check_range(block_id, self.block_count)?;
        let start = block_id as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for MemDisk {
    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_block(&mut self, block_id: u32, buf: &mut Block) -> Result<()> {
        let span = self.span(block_id)?;
        buf.copy_from_slice(&self.blocks[span]);
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &Block) -> Result<()> {
        let span = self.span(block_id)?;
        self.blocks[span].copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }
}
