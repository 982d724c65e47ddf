use colored::*;
use dialoguer::Confirm;
use std::{error::Error, io::SeekFrom, path::PathBuf};

use flat_fs::{utils::format_timestamp, Fd, FileSystem};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls,
    Df,
    Info,
    Fds,
    Create(String),
    Rm(String),
    Open(String),
    Close(Fd),
    Read(Fd, usize),
    Write(Fd, String),
    Seek(Fd, i64),
    Truncate(Fd, u64),
    Size(Fd),
    Cat(String),
    Format,
    Exit,
}

/// 交互会话：挂载着的文件系统以及它所在的镜像
pub struct Session {
    pub fs: FileSystem,
    pub image: PathBuf,
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    let fs = &mut session.fs;
    match cmd {
        Command::Help => print_help(),
        Command::Ls => {
            let files = fs.list()?;
            if files.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for file in files {
                let open = if file.open_count > 0 {
                    format!(" [{} open]", file.open_count).yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "📄  {:<16} {:>10} B {:>5} blk{}",
                    file.name.cyan(),
                    file.size,
                    file.blocks,
                    open
                );
            }
        }
        Command::Df => {
            let usage = fs.usage()?;
            println!(
                "{}\n{}: {} / {} bytes\n{}: {} free of {} data blocks ({} total)\n{}: {} / {}\n{}: {}\n",
                "📊 Volume Usage".bright_yellow().bold(),
                "Stored".blue(),
                usage.total_bytes,
                usage.max_total_bytes,
                "Blocks".blue(),
                usage.free_blocks,
                usage.data_blocks,
                usage.block_count,
                "Files".blue(),
                usage.files,
                usage.max_files,
                "Open fds".blue(),
                usage.open_descriptors
            );
        }
        Command::Info => {
            let info = fs.volume_info()?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n{}: {} FAT + {} directory\n{}: {}\n",
                "💾 Volume".bright_yellow().bold(),
                "Image".blue(),
                session.image.display(),
                "Id".blue(),
                info.id,
                "Formatted".blue(),
                format_timestamp(info.formatted_at),
                "Metadata".blue(),
                info.fat_blocks,
                info.dir_blocks,
                "Max name".blue(),
                info.max_name_len
            );
        }
        Command::Fds => {
            for (fd, name, offset) in fs.descriptors()? {
                println!("🔗 {:>3}  {:<16} @ {}", fd, name.cyan(), offset);
            }
        }
        Command::Create(name) => {
            fs.create(name)?;
            println!("📝 Created file: {}", name.green());
        }
        Command::Rm(name) => {
            fs.delete(name)?;
            println!("❌ Deleted file: {}", name.red());
        }
        Command::Open(name) => {
            let fd = fs.open(name)?;
            println!("🔓 Opened {} as fd {}", name.cyan(), fd.to_string().green());
        }
        Command::Close(fd) => {
            fs.close(*fd)?;
            println!("🔒 Closed fd {}", fd);
        }
        Command::Read(fd, n) => {
            let mut buf = vec![0u8; *n];
            let read = fs.read(*fd, &mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf[..read]));
            println!("{}", format!("({read} bytes)").bright_black());
        }
        Command::Write(fd, content) => {
            let written = fs.write(*fd, content.as_bytes())?;
            if written < content.len() {
                println!(
                    "{} only {written} of {} bytes fit",
                    "⚠️  Volume full:".yellow(),
                    content.len()
                );
            } else {
                println!("{} {written} bytes", "✅ Wrote".green());
            }
        }
        Command::Seek(fd, offset) => {
            let pos = seek_target(*offset, fs.tell(*fd)?);
            let at = fs.seek(*fd, pos)?;
            println!("📍 fd {} now at {}", fd, at);
        }
        Command::Truncate(fd, len) => {
            fs.truncate(*fd, *len)?;
            println!("✂️  fd {} truncated to {} bytes", fd, len);
        }
        Command::Size(fd) => println!("📏 {} bytes", fs.size_of(*fd)?),
        Command::Cat(name) => {
            let fd = fs.open(name)?;
            let mut content = Vec::new();
            let mut buf = [0u8; 4096];
            let result = loop {
                match fs.read(fd, &mut buf) {
                    Ok(0) => break Ok(()),
                    Ok(n) => content.extend_from_slice(&buf[..n]),
                    Err(e) => break Err(e),
                }
            };
            fs.close(fd)?;
            result?;
            println!("{}", String::from_utf8_lossy(&content));
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Erase every file on {}?",
                    session.image.display()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled.".bright_black());
                return Ok(());
            }

            println!("💾 Formatting virtual disk...");
            drop(fs.unmount()?);
            fs.format(&session.image)?;
            fs.mount(&session.image)?;
            println!("{}", "✅ Disk formatted successfully!".green());
        }
        Command::Exit => {
            drop(fs.unmount()?);
            println!("{}", "👋 Exiting MiniFS shell...".yellow().bold());
        }
    }

    Ok(())
}

/// 把 shell 里的绝对位置换成 `SeekFrom`；负数照样交给文件系统，由它报 InvalidArgument
fn seek_target(offset: i64, current: u64) -> SeekFrom {
    match u64::try_from(offset) {
        Ok(n) => SeekFrom::Start(n),
        Err(_) => {
            let current = i64::try_from(current).unwrap_or(i64::MAX);
            SeekFrom::Current(offset.saturating_sub(current))
        }
    }
}

fn print_help() {
    println!("{}", "📘 MiniFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls                   List files
  df                   Show space usage
  info                 Show volume information
  create <file>        Create an empty file
  rm <file>            Delete a file (must be closed)
  open <file>          Open a file, prints its descriptor
  close <fd>           Close a descriptor
  fds                  List open descriptors
  read <fd> <n>        Read up to n bytes at the descriptor's offset
  write <fd> <text>    Write text at the descriptor's offset
  seek <fd> <offset>   Move the descriptor's offset
  truncate <fd> <len>  Shrink the file to len bytes
  size <fd>            Show file size
  cat <file>           Print a whole file
  format               Erase and reformat the disk image
  help                 Show this help message
  exit                 Unmount and quit
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_target_lands_on_the_requested_position() {
        assert_eq!(seek_target(7, 3), SeekFrom::Start(7));
        // 当前在 3，目标 -2：相对偏移 -5
        assert_eq!(seek_target(-2, 3), SeekFrom::Current(-5));
    }

    #[test]
    fn seek_target_saturates_instead_of_overflowing() {
        assert_eq!(seek_target(i64::MIN, 10), SeekFrom::Current(i64::MIN));
        assert_eq!(seek_target(-1, u64::MAX), SeekFrom::Current(-1 - i64::MAX));
    }
}
