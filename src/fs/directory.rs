use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        config::NAME_FIELD_LEN,
        error::{FsError, Result},
        fat::FAT_EOC,
        region::{blocks_for, read_region, write_region, SEQ_LEN_PREFIX},
        super_block::SuperBlock,
    },
};

// 一个目录项（内存中）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,                   // 文件大小（字节）
    pub head_block: Option<BlockId>, // 块链头，空文件为 None
    pub open_count: u32,             // 引用它的描述符个数，不落盘
}

impl DirEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            head_block: None,
            open_count: 0,
        }
    }
}

// 目录项的磁盘格式，所有字段定长
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirRecord {
    name: [u8; NAME_FIELD_LEN],
    name_len: u8,
    size: u64,
    head: u32,
}

impl From<&DirEntry> for DirRecord {
    fn from(entry: &DirEntry) -> Self {
        let mut name = [0u8; NAME_FIELD_LEN];
        let bytes = entry.name.as_bytes();
        name[..bytes.len()].copy_from_slice(bytes);
        Self {
            name,
            name_len: bytes.len() as u8,
            size: entry.size,
            head: entry.head_block.unwrap_or(FAT_EOC),
        }
    }
}

impl TryFrom<DirRecord> for DirEntry {
    type Error = FsError;

    fn try_from(record: DirRecord) -> Result<Self> {
        let name = record
            .name
            .get(..record.name_len as usize)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .ok_or_else(|| FsError::Corrupted("undecodable file name".to_string()))?;
        Ok(Self {
            name: name.to_string(),
            size: record.size,
            head_block: (record.head != FAT_EOC).then_some(record.head),
            open_count: 0,
        })
    }
}

/// 平坦目录：定容的槽位数组，名字唯一
#[derive(Debug, Clone)]
pub struct Directory {
    slots: Vec<Option<DirEntry>>,
    max_name_len: u32,
    index_map: HashMap<String, usize>, // name -> 槽位
}

impl Directory {
    pub fn new(max_files: u32, max_name_len: u32) -> Self {
        Self {
            slots: vec![None; max_files as usize],
            max_name_len,
            index_map: HashMap::new(),
        }
    }

    /// 目录镜像的字节数：只包含当前存在的目录项
    pub fn image_len(entries: u32) -> Result<usize> {
        let record = bincode::serialized_size(&DirRecord::from(&DirEntry::new("")))?;
        Ok((SEQ_LEN_PREFIX + record * u64::from(entries)) as usize)
    }

    /// 为 `max_files` 个目录项预留的块数
    pub fn region_blocks(max_files: u32) -> Result<u32> {
        Ok(blocks_for(Self::image_len(max_files)?))
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// 新建空文件，占用第一个空槽位
    pub fn create(&mut self, name: &str) -> Result<usize> {
        if self.is_full() {
            return Err(FsError::DirectoryFull);
        }
        if name.is_empty() {
            return Err(FsError::InvalidArgument("empty file name".to_string()));
        }
        if name.len() > self.max_name_len as usize {
            return Err(FsError::NameTooLong {
                name: name.to_string(),
                max: self.max_name_len,
            });
        }
        if self.index_map.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::DirectoryFull)?;
        self.slots[slot] = Some(DirEntry::new(name));
        self.index_map.insert(name.to_string(), slot);
        Ok(slot)
    }

    // 删除目录项，返回被删的内容
    pub fn remove(&mut self, slot: usize) -> Option<DirEntry> {
        let entry = self.slots.get_mut(slot)?.take()?;
        self.index_map.remove(&entry.name);
        Some(entry)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index_map.get(name).copied()
    }

    pub fn get(&self, slot: usize) -> Option<&DirEntry> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut DirEntry> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// 按槽位顺序遍历已占用的目录项
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|e| (slot, e)))
    }

    pub fn rebuild_index_map(&mut self) {
        self.index_map = self.iter().map(|(i, e)| (e.name.clone(), i)).collect();
    }

    pub fn load<D: BlockDevice>(disk: &mut D, sb: &SuperBlock) -> Result<Self> {
        if sb.dir_entries > sb.max_files {
            return Err(FsError::Corrupted(format!(
                "{} directory entries exceed capacity {}",
                sb.dir_entries, sb.max_files
            )));
        }

        let len = Self::image_len(sb.dir_entries)?;
        let bytes = read_region(disk, sb.dir_start, len)?;
        let records: Vec<DirRecord> = bincode::deserialize(&bytes)?;
        if records.len() > sb.max_files as usize {
            return Err(FsError::Corrupted("directory image overflows capacity".to_string()));
        }

        let mut dir = Self::new(sb.max_files, sb.max_name_len);
        for (slot, record) in records.into_iter().enumerate() {
            dir.slots[slot] = Some(DirEntry::try_from(record)?);
        }
        dir.rebuild_index_map();
        if dir.len() != sb.dir_entries as usize {
            return Err(FsError::Corrupted("duplicate file names in directory".to_string()));
        }
        Ok(dir)
    }

    /// 写回目录，返回写入的目录项个数
    pub fn sync<D: BlockDevice>(&self, disk: &mut D, sb: &SuperBlock) -> Result<u32> {
        let records: Vec<DirRecord> = self.iter().map(|(_, e)| DirRecord::from(e)).collect();
        let bytes = bincode::serialize(&records)?;
        write_region(disk, sb.dir_start, &bytes)?;
        Ok(records.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejections_in_order() {
        let mut dir = Directory::new(2, 4);
        assert!(matches!(dir.create("toolong"), Err(FsError::NameTooLong { max: 4, .. })));
        assert_eq!(dir.create("a").unwrap(), 0);
        assert!(matches!(dir.create("a"), Err(FsError::AlreadyExists(_))));
        assert_eq!(dir.create("b").unwrap(), 1);
        // 目录满优先于其他检查
        assert!(matches!(dir.create("toolong"), Err(FsError::DirectoryFull)));
    }

    #[test]
    fn removed_slot_is_reused_first() {
        let mut dir = Directory::new(4, 15);
        dir.create("a").unwrap();
        dir.create("b").unwrap();
        dir.create("c").unwrap();

        let removed = dir.remove(dir.find("a").unwrap()).unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(dir.find("a"), None);
        assert_eq!(dir.len(), 2);

        assert_eq!(dir.create("d").unwrap(), 0);
        let names: Vec<_> = dir.iter().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, ["d", "b", "c"]);
    }

    #[test]
    fn new_entry_is_empty() {
        let mut dir = Directory::new(1, 15);
        let slot = dir.create("x").unwrap();
        let entry = dir.get(slot).unwrap();
        assert_eq!(entry.size, 0);
        assert_eq!(entry.head_block, None);
        assert_eq!(entry.open_count, 0);
    }

    #[test]
    fn record_keeps_name_and_chain_head() {
        let entry = DirEntry {
            name: "notes.txt".to_string(),
            size: 5000,
            head_block: Some(42),
            open_count: 3,
        };
        let back = DirEntry::try_from(DirRecord::from(&entry)).unwrap();
        assert_eq!(back.name, "notes.txt");
        assert_eq!(back.head_block, Some(42));
        assert_eq!(back.open_count, 0);
    }

    #[test]
    fn image_grows_with_entry_count() {
        let one = Directory::image_len(1).unwrap();
        let two = Directory::image_len(2).unwrap();
        assert_eq!(Directory::image_len(0).unwrap(), 8);
        assert_eq!(two - one, one - 8);
        assert_eq!(Directory::region_blocks(64).unwrap(), 1);
    }
}
