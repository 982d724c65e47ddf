//! 把一段连续字节按“整块 + 末尾不足一块的余数”写入/读出若干连续块。
//! FAT 与目录的磁盘镜像都走这里。

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::error::Result,
};

/// bincode 在序列化 `Vec` 时写在最前面的 u64 长度
pub const SEQ_LEN_PREFIX: u64 = 8;

/// 存放 `len` 字节需要多少块
pub fn blocks_for(len: usize) -> u32 {
    len.div_ceil(BLOCK_SIZE) as u32
}

/// 从 `start` 开始写入 `bytes`，返回占用的块数
pub fn write_region<D: BlockDevice>(disk: &mut D, start: u32, bytes: &[u8]) -> Result<u32> {
    let mut block: Block = [0; BLOCK_SIZE];
    let mut block_id = start;

    let mut chunks = bytes.chunks_exact(BLOCK_SIZE);
    for chunk in &mut chunks {
        block.copy_from_slice(chunk);
        disk.write_block(block_id, &block)?;
        block_id += 1;
    }

    // 最后一块只覆盖余下的字节，其余部分保持原样
    let rest = chunks.remainder();
    if !rest.is_empty() {
        disk.read_block(block_id, &mut block)?;
        block[..rest.len()].copy_from_slice(rest);
        disk.write_block(block_id, &block)?;
        block_id += 1;
    }

    Ok(block_id - start)
}

/// 从 `start` 开始读出恰好 `len` 字节
pub fn read_region<D: BlockDevice>(disk: &mut D, start: u32, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(len);
    let mut block: Block = [0; BLOCK_SIZE];
    let mut block_id = start;

    while bytes.len() < len {
        disk.read_block(block_id, &mut block)?;
        let chunk = (len - bytes.len()).min(BLOCK_SIZE);
        bytes.extend_from_slice(&block[..chunk]);
        block_id += 1;
    }

    Ok(bytes)
}
