use anyhow::Result;
use std::path::Path;
use std::fs;

pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Keep at most `limit` characters of `text`. Never splits a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Drop control characters (C0, DEL and C1) before handing model text to a JSON parser.
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

/// `reconnaissance` -> `Reconnaissance`, `command_control` -> `Command Control`
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text_intact() {
        assert_eq!(truncate_chars("nmap", 10), "nmap");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 5), "héllo");
        assert_eq!(truncate_chars(text, 0), "");
    }

    #[test]
    fn strip_removes_newlines_and_c1_controls() {
        let raw = "{\"a\":\n\t\"b\u{85}\"}\u{7f}";
        assert_eq!(strip_control_chars(raw), "{\"a\":\"b\"}");
    }

    #[test]
    fn title_case_phase_names() {
        assert_eq!(title_case("actions_objectives"), "Actions Objectives");
        assert_eq!(title_case("delivery"), "Delivery");
    }
}
