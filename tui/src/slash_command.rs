use std::collections::HashMap;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use strum_macros::IntoStaticStr;

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    Clear,
    Read,
    Ls,
    Quit,
}

impl SlashCommand {
    /// User-visible description, listed when an unknown command is typed.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "Clear the chat history and any pending changes.",
            SlashCommand::Read => "Show a workspace file: /read <path> [offset] [limit]",
            SlashCommand::Ls => "List workspace files: /ls [pattern] [dir]",
            SlashCommand::Quit => "Exit the application.",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a HashMap keyed by their command string.
pub fn built_in_slash_commands() -> HashMap<&'static str, SlashCommand> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Split `/name arg…` into a command and its whitespace-separated arguments.
/// Returns `None` when `text` is not a known slash command.
pub fn parse_slash_command(text: &str) -> Option<(SlashCommand, Vec<String>)> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let command = *built_in_slash_commands().get(parts.next()?)?;
    Some((command, parts.map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_command_and_arguments() {
        assert_eq!(
            parse_slash_command("/read src/main.rs 10 20"),
            Some((
                SlashCommand::Read,
                vec!["src/main.rs".to_string(), "10".to_string(), "20".to_string()]
            ))
        );
        assert_eq!(
            parse_slash_command("  /clear "),
            Some((SlashCommand::Clear, Vec::new()))
        );
    }

    #[test]
    fn unknown_or_plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("/frobnicate"), None);
        assert_eq!(parse_slash_command("read me"), None);
        assert_eq!(parse_slash_command("/"), None);
    }

    #[test]
    fn every_command_is_listed() {
        let commands = built_in_slash_commands();
        assert_eq!(commands.len(), 4);
        assert_eq!(commands.get("ls"), Some(&SlashCommand::Ls));
    }
}
