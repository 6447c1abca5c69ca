#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),  // any free text
    Load(String), // /load <url>
    Context,      // /context
    Help,         // /help
    Quit,         // quit | exit | /quit | /exit
    Empty,
    Unknown(String),
}

pub const HELP: &str = "\
Type a question about the loaded page and press Enter.
  /load <url>   load a different page
  /context      show the text the answers are based on
  /help         show this message
  quit          leave (also exit, /quit)";

pub fn parse_input(input: &str) -> Command {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return Command::Quit;
    }
    if !trimmed.starts_with('/') {
        return Command::Ask(trimmed.to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match (verb.as_str(), rest) {
        ("/load", Some(url)) => Command::Load(url.to_string()),
        ("/context", None) => Command::Context,
        ("/help", _) => Command::Help,
        ("/quit" | "/exit", None) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}
