use std::{path::PathBuf, sync::mpsc::Sender};

use crate::fs::{config::FsConfig, error::Result, FileSystem};

/// 启动过程中发给前台的进度消息
#[derive(Debug)]
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem>),
}

#[derive(Debug, Clone)]
pub struct BootOptions {
    pub image: PathBuf,
    pub config: FsConfig,
    pub force_format: bool,
}

/// 打开（必要时先格式化）磁盘镜像并挂载，结果通过 `tx` 送回
pub fn perform_disk_initialization(tx: Sender<BootProgress>, options: BootOptions) {
    let result = boot(&tx, &options);
    // 前台已经退出时没人接收，忽略即可
    let _ = tx.send(BootProgress::Finished(result));
}

fn boot(tx: &Sender<BootProgress>, options: &BootOptions) -> Result<FileSystem> {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual disk..."));
    let mut fs = FileSystem::new(options.config);

    let disk_exists = options.image.exists();
    if !disk_exists || options.force_format {
        // 只有“明确是新磁盘”或显式要求时才格式化
        let _ = tx.send(BootProgress::Step("🔧 Formatting new file system..."));
        log::info!("formatting {}", options.image.display());
        fs.format(&options.image)?;
    }
    let _ = tx.send(BootProgress::Progress(50));

    // 不论是否新盘，最终都要 mount
    let _ = tx.send(BootProgress::Step("⚙️ Mounting file system..."));
    fs.mount(&options.image)?;
    let _ = tx.send(BootProgress::Progress(100));

    Ok(fs)
}
