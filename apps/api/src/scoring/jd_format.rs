//! Splits job description text into display sections.
//!
//! Text is cut on `##`. The first chunk is a free-form preamble; every later chunk
//! starts with its header line. Inside a section, lines beginning with `-` are bullets.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum JdLine {
    Bullet(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JdSection {
    /// `None` for the preamble.
    pub title: Option<String>,
    pub lines: Vec<JdLine>,
}

pub fn parse_sections(text: &str) -> Vec<JdSection> {
    text.split("##")
        .enumerate()
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .map(|(idx, chunk)| {
            let chunk = chunk.trim();
            if idx == 0 {
                return JdSection {
                    title: None,
                    lines: vec![JdLine::Text(chunk.to_string())],
                };
            }

            let mut lines = chunk.lines();
            let title = lines.next().map(str::trim).filter(|t| !t.is_empty());
            JdSection {
                title: title.map(str::to_string),
                lines: lines.filter(|l| !l.trim().is_empty()).map(classify).collect(),
            }
        })
        .collect()
}

fn classify(line: &str) -> JdLine {
    match line.trim().strip_prefix('-') {
        Some(rest) => JdLine::Bullet(rest.trim().to_string()),
        None => JdLine::Text(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_and_sections() {
        let text = "Acme builds rockets.\n\n## Responsibilities\n- Ship APIs\n- Review code\n## Requirements\n- 5 years Rust\nBonus: Go";

        let sections = parse_sections(text);

        assert_eq!(sections.len(), 3);
        assert_eq!(
            sections[0],
            JdSection {
                title: None,
                lines: vec![JdLine::Text("Acme builds rockets.".to_string())],
            }
        );
        assert_eq!(sections[1].title.as_deref(), Some("Responsibilities"));
        assert_eq!(
            sections[1].lines,
            vec![
                JdLine::Bullet("Ship APIs".to_string()),
                JdLine::Bullet("Review code".to_string()),
            ]
        );
        assert_eq!(
            sections[2].lines,
            vec![
                JdLine::Bullet("5 years Rust".to_string()),
                JdLine::Text("Bonus: Go".to_string()),
            ]
        );
    }

    #[test]
    fn test_text_starting_with_header_has_no_preamble() {
        let sections = parse_sections("## Requirements\n-Rust");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title.as_deref(), Some("Requirements"));
        assert_eq!(sections[0].lines, vec![JdLine::Bullet("Rust".to_string())]);
    }

    #[test]
    fn test_plain_text_is_single_preamble() {
        let sections = parse_sections("Senior Backend Engineer\nBuild APIs");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].title.is_none());
    }

    #[test]
    fn test_blank_input() {
        assert!(parse_sections("").is_empty());
        assert!(parse_sections("  ##  \n").is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(JdLine::Bullet("Rust".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "bullet", "text": "Rust"}));
    }
}
