use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    let (&cmd, args) = tokens.split_first()?;

    let name = |i: usize| args.get(i).map(|s| s.to_string());
    let num = |i: usize| args.get(i).and_then(|s| s.parse().ok());

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "df" => Some(Command::Df),
        "info" => Some(Command::Info),
        "fds" => Some(Command::Fds),
        "create" | "touch" => name(0).map(Command::Create),
        "rm" => name(0).map(Command::Rm),
        "open" => name(0).map(Command::Open),
        "cat" => name(0).map(Command::Cat),
        "close" => num(0).map(Command::Close),
        "size" => num(0).map(Command::Size),
        "read" => Some(Command::Read(num(0)?, num(1)?)),
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(num(0)?, args[1..].join(" ")))
            } else {
                None
            }
        }
        // 偏移可以是负数，交给文件系统去拒绝
        "seek" => Some(Command::Seek(num(0)?, args.get(1)?.parse().ok()?)),
        "truncate" => Some(Command::Truncate(num(0)?, args.get(1)?.parse().ok()?)),
        "format" => Some(Command::Format),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}
