//! Bot command parsing.
//!
//! Only the commands the bot answers are recognised. Anything else, including
//! unknown `/words`, is ordinary chat text.

/// A recognised bot command and its argument, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    Clear,
    Profile,
    Plans,
    Model(Option<&'a str>),
    Buy(Option<&'a str>),
    Admin,
}

impl<'a> Command<'a> {
    /// Parse message text. Returns `None` for text that is not a known command.
    ///
    /// Accepts the `/cmd@BotName` form Telegram uses in group chats; the
    /// argument is the first whitespace-separated word after the command.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;

        let mut words = rest.split_whitespace();
        let head = words.next()?;
        let name = head.split('@').next().unwrap_or(head);
        let arg = words.next();

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "clear" => Command::Clear,
            "profile" => Command::Profile,
            "plans" | "sub" => Command::Plans,
            "model" => Command::Model(arg),
            "buy" => Command::Buy(arg),
            "admin" => Command::Admin,
            _ => return None,
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("  /clear"), Some(Command::Clear));
        assert_eq!(Command::parse("/sub"), Some(Command::Plans));
        assert_eq!(Command::parse("/admin"), Some(Command::Admin));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(Command::parse("/model"), Some(Command::Model(None)));
        assert_eq!(
            Command::parse("/model   deepseek extra"),
            Some(Command::Model(Some("deepseek")))
        );
        assert_eq!(Command::parse("/buy pro"), Some(Command::Buy(Some("pro"))));
    }

    #[test]
    fn test_parse_bot_mention() {
        assert_eq!(Command::parse("/Profile@relay_bot"), Some(Command::Profile));
    }

    #[test]
    fn test_non_commands_are_chat_text() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("/unknown thing"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse(""), None);
    }
}
