use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A story as supplied by the content provider. `content` holds the full
/// text with paragraphs delimited by newlines.
#[derive(Debug, Deserialize, Clone)]
pub struct Story {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
    pub content: String,
}

impl Story {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read story file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse story file {}", path.display()))
    }

    pub fn paragraphs(&self) -> Vec<&str> {
        split_paragraphs(&self.content)
    }
}

/// Splits story content on newlines, discarding blank paragraphs.
pub fn split_paragraphs(content: &str) -> Vec<&str> {
    content
        .split('\n')
        .filter(|p| !p.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_paragraphs_are_discarded() {
        let paragraphs = split_paragraphs("Para one.\n\nPara two.\n\nPara three.");
        assert_eq!(paragraphs, vec!["Para one.", "Para two.", "Para three."]);
        assert!(split_paragraphs("\n  \n\t\n").is_empty());
    }

    #[test]
    fn loads_story_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": 7, "title": "The Storm", "author": "A. Writer", "genre": "Fantasy", "content": "One.\nTwo."}}"#
        )
        .unwrap();

        let story = Story::load(file.path()).unwrap();
        assert_eq!(story.title, "The Storm");
        assert_eq!(story.genre, "Fantasy");
        assert_eq!(story.paragraphs().len(), 2);
    }

    #[test]
    fn missing_optional_fields_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"title": "Untitled", "content": "Text."}}"#).unwrap();
        let story = Story::load(file.path()).unwrap();
        assert_eq!(story.author, "");
        assert_eq!(story.genre, "");
    }
}
