/// 每个逻辑块（Block）的大小：4KB
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 默认块总数：4096 块 × 4KB = 16MB
pub const DEFAULT_BLOCK_COUNT: u32 = 4096;

/// 块号。FAT 表项中的 `next` 字段也使用这个宽度，便于定长序列化。
pub type BlockId = u32;

/// 定义一个逻辑块类型（每块 4KB 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];

/// 给定块数时磁盘镜像的字节大小
pub const fn disk_size(block_count: u32) -> u64 {
    block_count as u64 * BLOCK_SIZE as u64
}
