use std::ops::Range;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        error::{FsError, Result},
        region::{read_region, write_region, SEQ_LEN_PREFIX},
        super_block::SuperBlock,
    },
};

bitflags! {
    /// FAT 表项状态位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// 块属于某条链（元数据或文件数据）
        const BUSY = 0b0000_0001;
        /// 元数据块，永远不会被分配给文件
        const RESERVED = 0b0000_0010;
    }
}

/// 链表结尾
pub const FAT_EOC: u32 = u32::MAX;

/// 一个 FAT 表项，磁盘上定长 5 字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatEntry {
    flags: u8,
    next: u32,
}

impl FatEntry {
    pub const FREE: Self = Self {
        flags: 0,
        next: FAT_EOC,
    };

    pub fn flags(&self) -> BlockFlags {
        BlockFlags::from_bits_truncate(self.flags)
    }

    pub fn is_busy(&self) -> bool {
        self.flags().contains(BlockFlags::BUSY)
    }

    /// 只有 busy 的块 next 才有意义
    pub fn next(&self) -> Option<BlockId> {
        (self.is_busy() && self.next != FAT_EOC).then_some(self.next)
    }
}

/// 文件分配表：每个块一个表项，既记录空闲与否，也串起每个文件的块链
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<FatEntry>,
    data_start: BlockId, // 空闲块搜索的起点，之前都是元数据
}

impl Fat {
    pub fn new(block_count: u32) -> Self {
        Self {
            entries: vec![FatEntry::FREE; block_count as usize],
            data_start: 0,
        }
    }

    /// FAT 序列化后的字节数，只和块数有关
    pub fn image_len(block_count: u32) -> Result<usize> {
        let entry = bincode::serialized_size(&FatEntry::FREE)?;
        Ok((SEQ_LEN_PREFIX + entry * u64::from(block_count)) as usize)
    }

    /// 把一段元数据块标记为永久占用，并按顺序串成一条链
    pub fn reserve(&mut self, range: Range<BlockId>) {
        let last = range.end.saturating_sub(1);
        for id in range.clone() {
            self.entries[id as usize] = FatEntry {
                flags: (BlockFlags::BUSY | BlockFlags::RESERVED).bits(),
                next: if id == last { FAT_EOC } else { id + 1 },
            };
        }
        self.data_start = self.data_start.max(range.end);
    }

    pub fn block_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn data_start(&self) -> BlockId {
        self.data_start
    }

    pub fn entry(&self, block: BlockId) -> Option<&FatEntry> {
        self.entries.get(block as usize)
    }

    pub fn next(&self, block: BlockId) -> Option<BlockId> {
        self.entry(block).and_then(FatEntry::next)
    }

    /// 线性扫描数据区，编号最小的空闲块优先
    pub fn find_free(&self) -> Option<BlockId> {
        (self.data_start..self.block_count()).find(|&id| !self.entries[id as usize].is_busy())
    }

    /// 分配一个空闲块挂到 `tail` 后面；`tail` 为 `None` 时新块成为链头
    pub fn append(&mut self, tail: Option<BlockId>) -> Option<BlockId> {
        let block = self.find_free()?;
        self.entries[block as usize] = FatEntry {
            flags: BlockFlags::BUSY.bits(),
            next: FAT_EOC,
        };
        if let Some(tail) = tail {
            self.entries[tail as usize].next = block;
        }
        log::debug!("allocated block {block} after {tail:?}");
        Some(block)
    }

    /// 沿链走 `n` 步，返回第 `n` 个块（从 0 开始）
    pub fn nth(&self, head: Option<BlockId>, n: usize) -> Option<BlockId> {
        let mut current = head;
        for _ in 0..n {
            current = self.next(current?);
        }
        current
    }

    /// 链长，遇到环时最多数到块总数为止
    pub fn chain_len(&self, head: Option<BlockId>) -> usize {
        let mut len = 0;
        let mut current = head;
        while let Some(block) = current {
            if len >= self.entries.len() {
                break;
            }
            len += 1;
            current = self.next(block);
        }
        len
    }

    /// 释放整条链，返回释放的块数
    pub fn free_chain(&mut self, head: Option<BlockId>) -> u32 {
        let mut freed = 0;
        let mut current = head;
        while let Some(block) = current {
            match self.entries.get_mut(block as usize) {
                Some(entry) if entry.is_busy() => {
                    current = entry.next();
                    *entry = FatEntry::FREE;
                    freed += 1;
                }
                _ => break,
            }
        }
        if freed > 0 {
            log::debug!("freed {freed} block(s) starting at {head:?}");
        }
        freed
    }

    /// 释放 `tail` 之后的所有块，`tail` 成为新的链尾
    pub fn free_after(&mut self, tail: BlockId) -> u32 {
        let rest = self.next(tail);
        self.entries[tail as usize].next = FAT_EOC;
        self.free_chain(rest)
    }

    /// 数据区内空闲块个数
    pub fn free_data_blocks(&self) -> u32 {
        self.entries[self.data_start as usize..]
            .iter()
            .filter(|e| !e.is_busy())
            .count() as u32
    }

    pub fn load<D: BlockDevice>(disk: &mut D, sb: &SuperBlock) -> Result<Self> {
        let len = Self::image_len(sb.block_count)?;
        let bytes = read_region(disk, sb.fat_start, len)?;
        let entries: Vec<FatEntry> = bincode::deserialize(&bytes)?;

        if entries.len() != sb.block_count as usize {
            return Err(FsError::Corrupted(format!(
                "FAT has {} entries, expected {}",
                entries.len(),
                sb.block_count
            )));
        }
        Ok(Self {
            entries,
            data_start: sb.data_start(),
        })
    }

    pub fn sync<D: BlockDevice>(&self, disk: &mut D, sb: &SuperBlock) -> Result<()> {
        let bytes = bincode::serialize(&self.entries)?;
        write_region(disk, sb.fat_start, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Fat {
        let mut fat = Fat::new(16);
        fat.reserve(0..1);
        fat.reserve(1..3);
        fat
    }

    #[test]
    fn reserved_blocks_are_never_handed_out() {
        let mut fat = table();
        assert_eq!(fat.data_start(), 3);
        assert_eq!(fat.free_data_blocks(), 13);
        assert_eq!(fat.next(1), Some(2));
        assert_eq!(fat.next(2), None);
        assert!(fat.entry(0).unwrap().flags().contains(BlockFlags::RESERVED));

        assert_eq!(fat.append(None), Some(3));
    }

    #[test]
    fn append_links_and_lowest_index_wins() {
        let mut fat = table();
        let head = fat.append(None).unwrap();
        let other = fat.append(None).unwrap();
        let second = fat.append(Some(head)).unwrap();

        assert_eq!((head, other, second), (3, 4, 5));
        assert_eq!(fat.next(head), Some(5));
        assert_eq!(fat.chain_len(Some(head)), 2);
        assert_eq!(fat.nth(Some(head), 1), Some(5));
        assert_eq!(fat.nth(Some(head), 2), None);

        fat.free_chain(Some(other));
        assert_eq!(fat.find_free(), Some(4));
    }

    #[test]
    fn full_table_returns_none() {
        let mut fat = Fat::new(4);
        fat.reserve(0..2);
        let a = fat.append(None);
        let b = fat.append(a);
        assert!(a.is_some() && b.is_some());
        assert_eq!(fat.append(b), None);
        assert_eq!(fat.free_data_blocks(), 0);
    }

    #[test]
    fn free_after_keeps_prefix() {
        let mut fat = table();
        let head = fat.append(None);
        let mut tail = head;
        for _ in 0..3 {
            tail = fat.append(tail);
        }
        assert_eq!(fat.chain_len(head), 4);

        let cut = fat.nth(head, 1).unwrap();
        assert_eq!(fat.free_after(cut), 2);
        assert_eq!(fat.chain_len(head), 2);
        assert_eq!(fat.next(cut), None);
        assert_eq!(fat.free_data_blocks(), 11);

        assert_eq!(fat.free_chain(head), 2);
        assert_eq!(fat.free_data_blocks(), 13);
        assert_eq!(*fat.entry(cut).unwrap(), FatEntry::FREE);
    }

    #[test]
    fn image_len_is_fixed_width() {
        assert_eq!(Fat::image_len(4096).unwrap(), 8 + 4096 * 5);
        let bytes = bincode::serialize(&table().entries).unwrap();
        assert_eq!(Fat::image_len(16).unwrap(), bytes.len());
    }
}
