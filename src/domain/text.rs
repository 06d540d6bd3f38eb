use strsim::levenshtein;

/// Normalizes free text so it can be used as a stable comparison key.
pub fn sanitize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '"' | '\\') && !is_control(*c))
        .collect();

    cleaned
        .trim()
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}')
}

/// Picks the option closest to `text` by edit distance, first one wins on ties.
pub fn find_best_match<'a>(text: &str, options: &'a [String]) -> Option<&'a String> {
    let text = text.to_lowercase();
    options
        .iter()
        .min_by_key(|option| levenshtein(&text, &option.to_lowercase()))
}

/// Strips list decorations an LLM tends to add around `;` separated picks.
pub fn split_choices(reply: &str) -> Vec<String> {
    reply
        .replace(['[', ']', '\''], "")
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{find_best_match, sanitize_text, split_choices};

    #[test]
    fn sanitize_text_strips_noise() {
        assert_eq!(sanitize_text(" This is a \ntest! "), "this is a test!");
        assert_eq!(sanitize_text("\"Yandex\\\","), "yandex");
        assert_eq!(sanitize_text("Sber,, \r\n"), "sber");
        assert_eq!(sanitize_text("a\u{7f}b\u{1}c"), "abc");
    }

    #[test]
    fn sanitize_text_is_idempotent() {
        let samples = [
            " This is a \ntest! ",
            "a ,",
            "  ,,Company , ,",
            "\t\"Quoted\"\t",
            "ООО \"Ромашка\"",
            "",
            ",",
            "Multi\r\nLine\\Text,",
        ];

        for sample in samples {
            let once = sanitize_text(sample);
            assert_eq!(sanitize_text(&once), once, "sample: {:?}", sample);
        }
    }

    #[test]
    fn find_best_match_picks_closest() {
        let options = vec![
            "Home".to_string(),
            "Hound".to_string(),
            "House".to_string(),
            "Hill".to_string(),
        ];

        assert_eq!(find_best_match("Horse", &options).unwrap(), "House");
        assert_eq!(find_best_match("HILL", &options).unwrap(), "Hill");
    }

    #[test]
    fn find_best_match_empty_options() {
        assert!(find_best_match("anything", &[]).is_none());
    }

    #[test]
    fn split_choices_removes_brackets() {
        assert_eq!(
            split_choices("['Rust'; 'Go' ; Python]"),
            vec!["Rust".to_string(), "Go".to_string(), "Python".to_string()]
        );
    }
}
