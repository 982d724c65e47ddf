use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
};

use crate::disk::{
    block_device::{check_range, BlockDevice},
    types::{disk_size, Block, BLOCK_SIZE},
};

/// 以宿主机文件（disk.img）模拟的块设备
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    block_count: u32,
}

impl FileDisk {
    /// 新建（或覆盖）一个镜像文件，并预分配 `block_count` 个块
    pub fn create(path: impl AsRef<Path>, block_count: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(disk_size(block_count))?;
        log::debug!("created disk image {} ({block_count} blocks)", path.display());

        Ok(Self { file, block_count })
    }

    /// 打开已存在的镜像文件，块数由文件长度决定
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("{} is not a whole number of blocks ({len} bytes)", path.display()),
            ));
        }
        let block_count = u32::try_from(len / BLOCK_SIZE as u64)
            .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

        Ok(Self { file, block_count })
    }

    fn seek_to(&mut self, block_id: u32) -> Result<()> {
        check_range(block_id, self.block_count)?;
        self.file
            .seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_block(&mut self, block_id: u32, buf: &mut Block) -> Result<()> {
        self.seek_to(block_id)?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &Block) -> Result<()> {
        self.seek_to(block_id)?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_reopen_keeps_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("disk.img");

        let mut disk = FileDisk::create(&path, 8).unwrap();
        let mut block = [0u8; BLOCK_SIZE];
        block[..5].copy_from_slice(b"hello");
        disk.write_block(7, &block).unwrap();
        disk.flush().unwrap();
        drop(disk);

        let mut disk = FileDisk::open(&path).unwrap();
        assert_eq!(disk.block_count(), 8);
        let mut out = [0u8; BLOCK_SIZE];
        disk.read_block(7, &mut out).unwrap();
        assert_eq!(&out[..5], b"hello");
    }

    #[test]
    fn out_of_range_block_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut disk = FileDisk::create(dir.path().join("d.img"), 2).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        let err = disk.read_block(2, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn open_missing_image_fails() {
        let dir = TempDir::new().unwrap();
        assert!(FileDisk::open(dir.path().join("nope.img")).is_err());
    }
}
