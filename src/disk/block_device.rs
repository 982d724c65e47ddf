use std::io::{Error, ErrorKind, Result};

use crate::disk::types::{Block, BlockId};

/// 块设备：固定块大小、固定块数，只支持整块读写。
pub trait BlockDevice: Send {
    fn block_count(&self) -> u32;
    fn read_block(&mut self, block_id: BlockId, buf: &mut Block) -> Result<()>;
    fn write_block(&mut self, block_id: BlockId, buf: &Block) -> Result<()>;

    /// 把缓冲的写入落盘，卸载时调用
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn check_range(block_id: BlockId, block_count: u32) -> Result<()> {
    if block_id >= block_count {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("block {block_id} out of range (device has {block_count} blocks)"),
        ));
    }
    Ok(())
}
