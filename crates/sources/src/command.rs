//! Command-line building for host launch commands.

use std::path::Path;

/// Wraps a value in double quotes when it contains whitespace.
pub fn quote(value: &str) -> String {
    if value.chars().any(char::is_whitespace) && !value.starts_with('"') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Quoted form of a path for a command line.
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Command that opens a URI through the desktop's protocol handler.
pub fn open_uri_command(uri: &str) -> String {
    if cfg!(windows) {
        format!("cmd /c start \"\" \"{uri}\"")
    } else {
        format!("xdg-open \"{uri}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote("game.exe"), "game.exe");
        assert_eq!(quote("My Game/game.exe"), "\"My Game/game.exe\"");
        assert_eq!(quote("\"already quoted\""), "\"already quoted\"");
    }

    #[test]
    fn uri_is_quoted() {
        let cmd = open_uri_command("a://b?c=1&d=2");
        assert!(cmd.ends_with("\"a://b?c=1&d=2\""), "{cmd}");
    }
}
