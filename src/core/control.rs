/// Built-in commands recognised at the prompt. Anything else is a
/// natural-language request for the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Help,
    Status,
    /// Templates of the named phase, or the current one
    Templates(Option<String>),
    Search(String),
    Save,
    Phase(String),
    Risk,
    Quit,
}

impl ControlCommand {
    /// Match the first word case-insensitively; the rest is the argument.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "help" => Self::Help,
            "status" => Self::Status,
            "templates" => Self::Templates(Some(rest.to_string()).filter(|r| !r.is_empty())),
            "search" => Self::Search(rest.to_string()),
            "save" => Self::Save,
            "phase" => Self::Phase(rest.to_string()),
            "risk" => Self::Risk,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };

        Some(command)
    }
}
