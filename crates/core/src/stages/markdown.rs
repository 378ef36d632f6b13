//! Markdown conversion stage.

/// Paragraph separator in both the input text and the markdown output.
const PARAGRAPH_BREAK: &str = "\n\n";

/// Convert extracted text to markdown.
///
/// Paragraphs are trimmed and empty ones dropped. Converting its own output
/// again yields the same text.
pub fn convert_markdown(text: &str) -> String {
    text.split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_drops_empty_paragraphs() {
        let text = "  Intro line  \n\n\n\n   \n\nBody\nwith wrap \n\n";
        assert_eq!(convert_markdown(text), "Intro line\n\nBody\nwith wrap");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "single",
            "a\n\n\n\nb",
            "  x \n\n \n\n\n y\n",
            "\n\n\n\n\n",
            "para one\n\npara two\n\n  para three  ",
        ];
        for input in inputs {
            let once = convert_markdown(input);
            assert_eq!(convert_markdown(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_literal_cases() {
        assert_eq!(convert_markdown("Page1\n\nPage2"), "Page1\n\nPage2");
        assert_eq!(convert_markdown("  A  \n\n\n\n  B  "), "A\n\nB");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(convert_markdown(""), "");
        assert_eq!(convert_markdown("   \n\n  "), "");
    }
}
