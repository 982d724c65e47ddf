//! 描述符上的字节级读写：把文件内偏移换算成块链上的第几块、块内第几字节。

use std::io::SeekFrom;

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        directory::DirEntry,
        error::{FsError, Result},
        fd_table::Fd,
        Volume,
    },
};

const BLOCK: u64 = BLOCK_SIZE as u64;

impl<D: BlockDevice> Volume<D> {
    pub(crate) fn entry(&self, slot: usize) -> Result<&DirEntry> {
        self.directory
            .get(slot)
            .ok_or_else(|| FsError::InvalidState(format!("descriptor bound to empty slot {slot}")))
    }

    pub(crate) fn entry_mut(&mut self, slot: usize) -> Result<&mut DirEntry> {
        self.directory
            .get_mut(slot)
            .ok_or_else(|| FsError::InvalidState(format!("descriptor bound to empty slot {slot}")))
    }

    pub(crate) fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let open = *self.fds.get(fd)?;
        if buf.is_empty() {
            return Err(FsError::InvalidArgument("read of zero bytes".to_string()));
        }
        let entry = self.entry(open.dir_index)?;
        let (head, size) = (entry.head_block, entry.size);

        let available = size.saturating_sub(open.offset);
        if available == 0 {
            return Ok(0);
        }
        let to_read = (buf.len() as u64).min(available) as usize;

        let mut current = self.fat.nth(head, (open.offset / BLOCK) as usize);
        let mut in_block = (open.offset % BLOCK) as usize;
        let mut block: Block = [0; BLOCK_SIZE];
        let mut done = 0;

        while done < to_read {
            let id = current.ok_or_else(|| self.broken_chain(open.dir_index))?;
            self.disk.read_block(id, &mut block)?;

            let n = (BLOCK_SIZE - in_block).min(to_read - done);
            buf[done..done + n].copy_from_slice(&block[in_block..in_block + n]);
            done += n;
            in_block = 0;
            current = self.fat.next(id);
        }

        self.fds.get_mut(fd)?.offset += done as u64;
        Ok(done)
    }

    pub(crate) fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let open = *self.fds.get(fd)?;
        if data.is_empty() {
            return Err(FsError::InvalidArgument("write of zero bytes".to_string()));
        }
        let head = self.entry(open.dir_index)?.head_block;

        // 上限是整个卷剩余的容量，而不是单个文件
        let sb = &self.super_block;
        let room = sb.max_total_bytes().saturating_sub(sb.total_bytes);
        let to_write = (data.len() as u64).min(room) as usize;
        if to_write == 0 {
            log::warn!("volume full, nothing written to fd {fd}");
            return Ok(0);
        }

        // 走到偏移所在的块；偏移恰在块对齐的文件尾时 current 为 None，需要追加
        let mut prev: Option<BlockId> = None;
        let mut current = head;
        for _ in 0..open.offset / BLOCK {
            let id = current.ok_or_else(|| self.broken_chain(open.dir_index))?;
            prev = Some(id);
            current = self.fat.next(id);
        }

        let mut in_block = (open.offset % BLOCK) as usize;
        let mut written = 0;
        let mut failure = None;

        while written < to_write {
            let (id, fresh) = match current {
                Some(id) => (id, false),
                None => match self.grow(open.dir_index, prev)? {
                    Some(id) => (id, true),
                    None => {
                        log::warn!(
                            "no free block left, short write of {written}/{} bytes on fd {fd}",
                            data.len()
                        );
                        break;
                    }
                },
            };

            let n = (BLOCK_SIZE - in_block).min(to_write - written);
            if let Err(e) = self.fill_block(id, fresh, in_block, &data[written..written + n]) {
                if fresh {
                    self.shrink(open.dir_index, prev);
                }
                failure = Some(e);
                break;
            }

            written += n;
            in_block = 0;
            prev = Some(id);
            current = self.fat.next(id);
        }

        // 已经写下去的字节无论如何都要记账
        self.advance(fd, open.dir_index, open.offset + written as u64)?;
        match failure {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    pub(crate) fn seek(&mut self, fd: Fd, pos: SeekFrom) -> Result<u64> {
        let open = *self.fds.get(fd)?;
        let size = self.entry(open.dir_index)?.size;

        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(open.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
        };
        if target < 0 || target > i128::from(size) {
            return Err(FsError::InvalidArgument(format!(
                "seek to {target} outside 0..={size}"
            )));
        }

        let offset = target as u64;
        self.fds.get_mut(fd)?.offset = offset;
        Ok(offset)
    }

    pub(crate) fn truncate(&mut self, fd: Fd, length: u64) -> Result<()> {
        let open = *self.fds.get(fd)?;
        let entry = self.entry(open.dir_index)?;
        let (head, size) = (entry.head_block, entry.size);
        if length > size {
            return Err(FsError::InvalidArgument(format!(
                "truncate to {length} beyond size {size}"
            )));
        }

        // 先定位新链尾，链断了就在改动任何状态之前报错
        let keep = length.div_ceil(BLOCK) as usize;
        let new_tail = match keep {
            0 => None,
            n => Some(
                self.fat
                    .nth(head, n - 1)
                    .ok_or_else(|| self.broken_chain(open.dir_index))?,
            ),
        };

        let freed = match new_tail {
            Some(tail) => self.fat.free_after(tail),
            None => self.fat.free_chain(head),
        };
        self.super_block.free_blocks += freed;
        self.super_block.total_bytes -= size - length;

        let entry = self.entry_mut(open.dir_index)?;
        entry.size = length;
        if new_tail.is_none() {
            entry.head_block = None;
        }
        for other in self.fds.bound_to(open.dir_index) {
            other.offset = other.offset.min(length);
        }

        log::debug!("truncated fd {fd} from {size} to {length} bytes, freed {freed} block(s)");
        Ok(())
    }

    /// 给文件追加一个新块，卷满时返回 `None`
    fn grow(&mut self, slot: usize, tail: Option<BlockId>) -> Result<Option<BlockId>> {
        let Some(id) = self.fat.append(tail) else {
            return Ok(None);
        };
        self.super_block.free_blocks -= 1;
        if tail.is_none() {
            self.entry_mut(slot)?.head_block = Some(id);
        }
        Ok(Some(id))
    }

    /// 撤销 `grow` 刚追加的块
    fn shrink(&mut self, slot: usize, tail: Option<BlockId>) {
        let freed = match tail {
            Some(tail) => self.fat.free_after(tail),
            None => {
                let head = self.directory.get_mut(slot).and_then(|e| e.head_block.take());
                self.fat.free_chain(head)
            }
        };
        self.super_block.free_blocks += freed;
    }

    /// 读出块、覆盖 `[at, at + bytes.len())`、写回；新块或整块覆盖时不必先读
    fn fill_block(&mut self, id: BlockId, fresh: bool, at: usize, bytes: &[u8]) -> Result<()> {
        let mut block: Block = [0; BLOCK_SIZE];
        if !fresh && bytes.len() < BLOCK_SIZE {
            self.disk.read_block(id, &mut block)?;
        }
        block[at..at + bytes.len()].copy_from_slice(bytes);
        self.disk.write_block(id, &block)?;
        Ok(())
    }

    /// 移动描述符位置，超过文件尾的部分计入文件大小和全局用量
    fn advance(&mut self, fd: Fd, slot: usize, offset: u64) -> Result<()> {
        self.fds.get_mut(fd)?.offset = offset;
        let entry = self.entry_mut(slot)?;
        if offset > entry.size {
            let grown = offset - entry.size;
            entry.size = offset;
            self.super_block.total_bytes += grown;
        }
        Ok(())
    }

    fn broken_chain(&self, slot: usize) -> FsError {
        let (name, size) = self
            .directory
            .get(slot)
            .map(|e| (e.name.as_str(), e.size))
            .unwrap_or(("?", 0));
        log::error!("block chain of '{name}' ends before its recorded size {size}");
        FsError::InvalidState(format!("block chain of '{name}' is shorter than {size} bytes"))
    }
}
