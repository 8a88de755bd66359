use crate::ast::{BuiltinCommand, Input};

/// Classify one completed line.
///
/// While a job holds the foreground, the line is never interpreted: it
/// belongs to that job's stdin, blank lines included.
pub fn route(line: &str, has_foreground: bool) -> Input {
    if has_foreground {
        return Input::ForegroundInput(line.to_string());
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }

    match parse_builtin(trimmed) {
        Some(builtin) => Input::Builtin(builtin),
        None => Input::Spawn(trimmed.to_string()),
    }
}

/// Recognize a built-in by its exact first word. `cdrom` is not `cd`.
pub fn parse_builtin(line: &str) -> Option<BuiltinCommand> {
    let words = split_words(line);
    let (name, args) = words.split_first()?;
    let first_arg = args.first().cloned();

    let builtin = match name.as_str() {
        "cd" => BuiltinCommand::Cd(first_arg),
        "pwd" => BuiltinCommand::Pwd,
        "ls" => BuiltinCommand::Ls(first_arg),
        "fg" => BuiltinCommand::Fg(first_arg),
        "exit" => BuiltinCommand::Exit,
        "help" => BuiltinCommand::Help,
        _ => return None,
    };
    Some(builtin)
}

// Quote-aware when possible; unbalanced quotes fall back to whitespace.
fn split_words(line: &str) -> Vec<String> {
    shellwords::split(line)
        .unwrap_or_else(|_| line.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_empty() {
        assert_eq!(route("", false), Input::Empty);
        assert_eq!(route("   \t", false), Input::Empty);
    }

    #[test]
    fn test_route_foreground_takes_everything() {
        assert_eq!(
            route("exit", true),
            Input::ForegroundInput("exit".to_string())
        );
        assert_eq!(route("", true), Input::ForegroundInput(String::new()));
        assert_eq!(
            route("  fg 12 ", true),
            Input::ForegroundInput("  fg 12 ".to_string())
        );
    }

    #[test]
    fn test_route_builtins() {
        assert_eq!(route("pwd", false), Input::Builtin(BuiltinCommand::Pwd));
        assert_eq!(route("exit", false), Input::Builtin(BuiltinCommand::Exit));
        assert_eq!(route("help", false), Input::Builtin(BuiltinCommand::Help));
        assert_eq!(route("ls", false), Input::Builtin(BuiltinCommand::Ls(None)));
        assert_eq!(
            route("ls /tmp", false),
            Input::Builtin(BuiltinCommand::Ls(Some("/tmp".to_string())))
        );
        assert_eq!(
            route("  fg 4242  ", false),
            Input::Builtin(BuiltinCommand::Fg(Some("4242".to_string())))
        );
        assert_eq!(route("fg", false), Input::Builtin(BuiltinCommand::Fg(None)));
    }

    #[test]
    fn test_route_cd_quoted_path() {
        assert_eq!(
            route("cd \"my dir\"", false),
            Input::Builtin(BuiltinCommand::Cd(Some("my dir".to_string())))
        );
        assert_eq!(route("cd", false), Input::Builtin(BuiltinCommand::Cd(None)));
    }

    #[test]
    fn test_route_spawn() {
        assert_eq!(
            route("sleep 10", false),
            Input::Spawn("sleep 10".to_string())
        );
        // Prefix of a builtin name is not the builtin
        assert_eq!(route("cdrom", false), Input::Spawn("cdrom".to_string()));
        assert_eq!(route("lsblk -a", false), Input::Spawn("lsblk -a".to_string()));
    }

    #[test]
    fn test_parse_builtin_unbalanced_quotes() {
        assert_eq!(
            parse_builtin("cd 'oops"),
            Some(BuiltinCommand::Cd(Some("'oops".to_string())))
        );
    }
}
