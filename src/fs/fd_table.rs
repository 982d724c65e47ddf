use crate::fs::error::{FsError, Result};

/// 文件描述符：描述符表中的下标
pub type Fd = usize;

/// 一个打开的文件，只存在于内存中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub dir_index: usize,
    pub offset: u64,
}

/// 定容描述符表，每个描述符有独立的读写位置
#[derive(Debug, Clone)]
pub struct FdTable {
    slots: Vec<Option<OpenFile>>,
}

impl FdTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// 占用编号最小的空闲描述符
    pub fn open(&mut self, dir_index: usize) -> Result<Fd> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::DescriptorTableFull)?;
        self.slots[fd] = Some(OpenFile {
            dir_index,
            offset: 0,
        });
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    /// 所有指向 `dir_index` 的描述符
    pub fn bound_to(&mut self, dir_index: usize) -> impl Iterator<Item = &mut OpenFile> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(move |open| open.dir_index == dir_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Fd, &OpenFile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(fd, open)| open.as_ref().map(|o| (fd, o)))
    }

    pub fn in_use(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// 关闭全部描述符，返回关掉的个数
    pub fn clear(&mut self) -> usize {
        let closed = self.in_use();
        self.slots.fill(None);
        closed
    }
}
