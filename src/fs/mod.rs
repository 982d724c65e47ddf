use std::path::Path;

use uuid::Uuid;

use crate::{
    disk::{BlockDevice, FileDisk},
    fs::{
        config::{FsConfig, SUPER_BLOCK_ID},
        directory::Directory,
        error::{FsError, Result},
        fat::Fat,
        fd_table::{Fd, FdTable},
        super_block::SuperBlock,
    },
    utils::{current_timestamp, generate_uuid},
};

pub mod config;
pub mod directory;
pub mod error;
pub mod fat;
pub mod fd_table;
mod file;
pub mod region;
pub mod super_block;

/// 一个已挂载的卷：独占磁盘以及内存中的超级块、FAT、目录和描述符表
#[derive(Debug)]
pub(crate) struct Volume<D: BlockDevice> {
    pub(crate) disk: D,                 // 底层磁盘抽象层
    pub(crate) super_block: SuperBlock, // 文件系统总体信息
    pub(crate) fat: Fat,                // 块分配与块链
    pub(crate) directory: Directory,    // 平坦目录
    pub(crate) fds: FdTable,            // 打开的文件
}

/// `ls` 输出的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub blocks: usize,
    pub open_count: u32,
}

/// 卷的空间与容量使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub block_count: u32,
    pub data_blocks: u32,
    pub free_blocks: u32,
    pub total_bytes: u64,
    pub max_total_bytes: u64,
    pub files: usize,
    pub max_files: u32,
    pub open_descriptors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    pub id: Uuid,
    pub formatted_at: i64,
    pub block_count: u32,
    pub fat_blocks: u32,
    pub dir_blocks: u32,
    pub max_name_len: u32,
}

/// 文件系统上下文。所有操作都显式地作用在这个对象上，
/// 挂载前除格式化外的操作都会返回 `NotMounted`。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice = FileDisk> {
    config: FsConfig,
    volume: Option<Volume<D>>,
}

impl<D: BlockDevice> Default for FileSystem<D> {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn new(config: FsConfig) -> Self {
        Self {
            config,
            volume: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    fn volume(&self) -> Result<&Volume<D>> {
        self.volume.as_ref().ok_or(FsError::NotMounted)
    }

    fn volume_mut(&mut self) -> Result<&mut Volume<D>> {
        self.volume.as_mut().ok_or(FsError::NotMounted)
    }

    /// 在 `disk` 上写入空的超级块、FAT 和目录
    pub fn format_device(&self, disk: &mut D) -> Result<()> {
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }
        let config = FsConfig {
            block_count: disk.block_count(),
            ..self.config
        };
        config.validate()?;

        let (fat_blocks, dir_blocks) = config.metadata_blocks()?;
        let sb = SuperBlock::new(
            &config,
            fat_blocks,
            dir_blocks,
            generate_uuid(),
            current_timestamp(),
        );

        // 超级块、FAT 自身、目录区都是永久占用的
        let mut fat = Fat::new(config.block_count);
        fat.reserve(SUPER_BLOCK_ID..sb.fat_start);
        fat.reserve(sb.fat_start..sb.dir_start);
        fat.reserve(sb.dir_start..sb.data_start());

        fat.sync(disk, &sb)?;
        Directory::new(sb.max_files, sb.max_name_len).sync(disk, &sb)?;
        sb.sync(disk)?;

        log::info!(
            "formatted volume {}: {} blocks, fat {}+{}, dir {}+{}, {} data blocks",
            sb.volume_id(),
            sb.block_count,
            sb.fat_start,
            sb.fat_blocks,
            sb.dir_start,
            sb.dir_blocks,
            sb.data_blocks()
        );
        Ok(())
    }

    /// 读入超级块、FAT、目录，清空描述符表
    pub fn mount_device(&mut self, mut disk: D) -> Result<()> {
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }

        let mut super_block = SuperBlock::load(&mut disk)?;
        let fat = Fat::load(&mut disk, &super_block)?;
        let directory = Directory::load(&mut disk, &super_block)?;
        reconcile_counters(&mut super_block, &fat, &directory);

        log::info!(
            "mounted volume {}: {} file(s), {} bytes, {} free block(s)",
            super_block.volume_id(),
            directory.len(),
            super_block.total_bytes,
            super_block.free_blocks
        );
        self.volume = Some(Volume {
            disk,
            super_block,
            fat,
            directory,
            fds: FdTable::new(self.config.max_open_files),
        });
        Ok(())
    }

    /// 把目录、FAT、超级块写回磁盘，关闭所有描述符，交还设备
    pub fn unmount(&mut self) -> Result<D> {
        let volume = self.volume_mut()?;

        let entries = volume.directory.sync(&mut volume.disk, &volume.super_block)?;
        volume.super_block.dir_entries = entries;
        volume.fat.sync(&mut volume.disk, &volume.super_block)?;
        volume.super_block.sync(&mut volume.disk)?;
        volume.disk.flush()?;

        let closed = volume.fds.clear();
        if closed > 0 {
            log::info!("closed {closed} descriptor(s) left open at unmount");
        }

        let volume = self.volume.take().ok_or(FsError::NotMounted)?;
        log::info!("unmounted volume {}", volume.super_block.volume_id());
        Ok(volume.disk)
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        let volume = self.volume_mut()?;
        let slot = volume.directory.create(name)?;
        volume.super_block.dir_entries += 1;
        log::debug!("created '{name}' in slot {slot}");
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let volume = self.volume_mut()?;
        let slot = volume
            .directory
            .find(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let entry = volume.entry(slot)?;
        if entry.open_count != 0 {
            return Err(FsError::Busy(name.to_string()));
        }
        let (head, size) = (entry.head_block, entry.size);

        let freed = volume.fat.free_chain(head);
        volume.super_block.free_blocks += freed;
        volume.super_block.total_bytes -= size;
        volume.super_block.dir_entries -= 1;
        volume.directory.remove(slot);
        log::debug!("deleted '{name}', released {freed} block(s)");
        Ok(())
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.volume()?.directory.find(name).is_some())
    }

    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let volume = self.volume_mut()?;
        let slot = volume
            .directory
            .find(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let fd = volume.fds.open(slot)?;
        volume.entry_mut(slot)?.open_count += 1;
        log::debug!("opened '{name}' as fd {fd}");
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let volume = self.volume_mut()?;
        let open = volume.fds.close(fd)?;
        let entry = volume.entry_mut(open.dir_index)?;
        entry.open_count = entry.open_count.saturating_sub(1);
        log::debug!("closed fd {fd}");
        Ok(())
    }

    /// 从当前位置读到 `buf` 里，返回读到的字节数；到文件尾返回 0
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        self.volume_mut()?.read(fd, buf)
    }

    /// 从当前位置写入，返回实际写入的字节数；卷满时可能少于 `data.len()`
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        self.volume_mut()?.write(fd, data)
    }

    pub fn seek(&mut self, fd: Fd, pos: std::io::SeekFrom) -> Result<u64> {
        self.volume_mut()?.seek(fd, pos)
    }

    pub fn tell(&self, fd: Fd) -> Result<u64> {
        Ok(self.volume()?.fds.get(fd)?.offset)
    }

    pub fn truncate(&mut self, fd: Fd, length: u64) -> Result<()> {
        self.volume_mut()?.truncate(fd, length)
    }

    pub fn size_of(&self, fd: Fd) -> Result<u64> {
        let volume = self.volume()?;
        let open = volume.fds.get(fd)?;
        Ok(volume.entry(open.dir_index)?.size)
    }

    pub fn list(&self) -> Result<Vec<FileInfo>> {
        let volume = self.volume()?;
        Ok(volume
            .directory
            .iter()
            .map(|(_, e)| FileInfo {
                name: e.name.clone(),
                size: e.size,
                blocks: volume.fat.chain_len(e.head_block),
                open_count: e.open_count,
            })
            .collect())
    }

    /// 当前打开的描述符及其文件名和位置
    pub fn descriptors(&self) -> Result<Vec<(Fd, String, u64)>> {
        let volume = self.volume()?;
        volume
            .fds
            .iter()
            .map(|(fd, open)| -> Result<(Fd, String, u64)> {
                Ok((fd, volume.entry(open.dir_index)?.name.clone(), open.offset))
            })
            .collect()
    }

    pub fn usage(&self) -> Result<Usage> {
        let volume = self.volume()?;
        let sb = &volume.super_block;
        Ok(Usage {
            block_count: sb.block_count,
            data_blocks: sb.data_blocks(),
            free_blocks: sb.free_blocks,
            total_bytes: sb.total_bytes,
            max_total_bytes: sb.max_total_bytes(),
            files: volume.directory.len(),
            max_files: sb.max_files,
            open_descriptors: volume.fds.in_use(),
        })
    }

    pub fn volume_info(&self) -> Result<VolumeInfo> {
        let sb = &self.volume()?.super_block;
        Ok(VolumeInfo {
            id: sb.volume_id(),
            formatted_at: sb.formatted_at,
            block_count: sb.block_count,
            fat_blocks: sb.fat_blocks,
            dir_blocks: sb.dir_blocks,
            max_name_len: sb.max_name_len,
        })
    }
}

impl FileSystem<FileDisk> {
    /// 新建镜像文件并格式化，完成后关闭
    pub fn format(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }
        // 先校验再创建镜像，创建会截断已有的卷
        self.config.validate()?;

        let mut disk =
            FileDisk::create(path, self.config.block_count).map_err(|e| FsError::store(path, e))?;
        self.format_device(&mut disk)?;
        disk.flush().map_err(|e| FsError::store(path, e))
    }

    pub fn mount(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }
        let disk = FileDisk::open(path).map_err(|e| FsError::store(path, e))?;
        self.mount_device(disk)
    }
}

/// 挂载时用 FAT 和目录核对超级块里的计数，不一致时以实际结构为准
fn reconcile_counters(sb: &mut SuperBlock, fat: &Fat, directory: &Directory) {
    let free_blocks = fat.free_data_blocks();
    if sb.free_blocks != free_blocks {
        log::warn!(
            "super block records {} free blocks, FAT has {free_blocks}; using FAT",
            sb.free_blocks
        );
        sb.free_blocks = free_blocks;
    }

    let total_bytes: u64 = directory.iter().map(|(_, e)| e.size).sum();
    if sb.total_bytes != total_bytes {
        log::warn!(
            "super block records {} stored bytes, directory has {total_bytes}; using directory",
            sb.total_bytes
        );
        sb.total_bytes = total_bytes;
    }
}
