pub mod command;
pub mod parse;

use crate::{
    cli::Cli,
    shell::{
        command::{execute_command, Command, Session},
        parse::parse_command,
    },
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use flat_fs::{
    disk::init::{perform_disk_initialization, BootOptions, BootProgress},
    FileSystem,
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{io::stdout, path::PathBuf, sync::mpsc, thread};

const COMMANDS: [&str; 17] = [
    "help", "ls", "df", "info", "fds", "create", "rm", "open", "close", "read", "write", "seek",
    "truncate", "size", "cat", "format", "exit",
];

pub fn start_shell(cli: &Cli) {
    let Some(fs) = boot(cli) else {
        return;
    };
    let mut session = Session {
        fs,
        image: cli.image.clone(),
    };

    let username = whoami::username();
    let hostname = whoami::devicename();

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minifs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => log::warn!("command history disabled: {e}"),
    }

    // 命令补全
    let completer =
        DefaultCompleter::new_with_wordlen(COMMANDS.iter().map(|c| c.to_string()).collect(), 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!("{}@{}", username, hostname)),
            DefaultPromptSegment::Basic("MiniFS".to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        let result = execute_command(&cmd, &mut session);
                        if let Err(e) = &result {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) && result.is_ok() {
                            println!("{}", "👋 Bye!".bright_yellow());
                            return;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or bad arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting MiniFS...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    // Ctrl-D 或读行失败时也要卸载，否则元数据不会落盘
    if let Err(e) = session.fs.unmount() {
        println!("{} {}", "❌ Unmount failed:".red().bold(), e);
    }
    println!("{}", "GoodBye!".bright_yellow());
}

/// 后台线程完成格式化/挂载，前台根据进度消息刷新进度条
fn boot(cli: &Cli) -> Option<FileSystem> {
    let mut stdout = stdout();
    let _ = execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0));
    println!("{}", "[MiniFS Booting...]".bright_yellow().bold());

    let options = BootOptions {
        image: cli.image.clone(),
        config: cli.fs_config(),
        force_format: cli.format,
    };
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_disk_initialization(tx, options));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut outcome = None;
    for msg in rx {
        match msg {
            BootProgress::Step(step) => pb.set_message(step),
            BootProgress::Progress(p) => pb.set_position(p),
            BootProgress::Finished(result) => outcome = Some(result),
        }
    }
    let _ = worker.join();

    match outcome {
        Some(Ok(fs)) => {
            pb.finish_with_message("✅ Ready!");
            let _ = execute!(
                stdout,
                SetForegroundColor(Color::Cyan),
                Print(format!("Welcome to MiniFS v{}\n", env!("CARGO_PKG_VERSION"))),
                ResetColor
            );
            Some(fs)
        }
        Some(Err(e)) => {
            pb.abandon_with_message("boot failed");
            println!("{} {}", "❌ Cannot mount disk image:".red().bold(), e);
            None
        }
        None => {
            pb.abandon_with_message("boot thread died");
            None
        }
    }
}
