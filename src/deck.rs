use crate::error::{Result, TrackerError};
use log::info;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    pub title: String,
    pub body: String,
    pub image: Option<PathBuf>,
}

/// Ordered slide deck: a title slide followed by content slides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deck {
    pub title: String,
    pub subtitle: String,
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn new(title: &str, subtitle: &str) -> Self {
        Deck {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            slides: Vec::new(),
        }
    }

    pub fn add_text(&mut self, title: &str, body: &str) -> &mut Self {
        self.slides.push(Slide {
            title: title.to_string(),
            body: body.to_string(),
            image: None,
        });
        self
    }

    /// Append a slide embedding `image`; the file must already exist.
    pub fn add_image(&mut self, title: &str, body: &str, image: &Path) -> Result<&mut Self> {
        if !image.is_file() {
            return Err(TrackerError::MissingImage(image.to_path_buf()));
        }
        self.slides.push(Slide {
            title: title.to_string(),
            body: body.to_string(),
            image: Some(image.to_path_buf()),
        });
        Ok(self)
    }

    /// Markdown slides separated by `---`; image links are made relative to
    /// the deck's directory when possible.
    pub fn to_markdown(&self, deck_dir: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        for line in self.subtitle.lines() {
            let _ = writeln!(out, "{}  ", line);
        }
        for slide in &self.slides {
            let _ = writeln!(out, "\n---\n\n## {}\n", slide.title);
            for line in slide.body.lines() {
                let _ = writeln!(out, "{}", line);
            }
            if let Some(image) = &slide.image {
                let link = image.strip_prefix(deck_dir).unwrap_or(image);
                let _ = writeln!(out, "\n![{}]({})", slide.title, link.display());
            }
        }
        out
    }

    pub fn write_markdown(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        std::fs::write(path, self.to_markdown(dir))?;
        info!("Wrote slide deck {} ({} slides)", path.display(), self.slides.len() + 1);
        Ok(())
    }

    pub fn write_manifest(&self, path: &Path) -> Result<()> {
        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(path, s)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slides_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("chart.svg");
        std::fs::write(&img, "<svg/>").unwrap();

        let mut deck = Deck::new("Analysis", "Line one\nLine two");
        deck.add_text("Introduction", "Objective");
        deck.add_image("Chart", "Bar chart", &img).unwrap();
        deck.add_text("Questions", "Any?");

        let titles: Vec<&str> = deck.slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "Chart", "Questions"]);

        let md = deck.to_markdown(dir.path());
        assert_eq!(
            md,
            "# Analysis\n\nLine one  \nLine two  \n\n---\n\n## Introduction\n\nObjective\n\n---\n\n## Chart\n\nBar chart\n\n![Chart](chart.svg)\n\n---\n\n## Questions\n\nAny?\n"
        );
    }

    #[test]
    fn missing_image_is_rejected() {
        let mut deck = Deck::new("t", "s");
        let err = deck.add_image("x", "y", Path::new("/definitely/not/here.svg")).unwrap_err();
        assert!(matches!(err, TrackerError::MissingImage(_)));
        assert!(deck.slides.is_empty());
    }

    #[test]
    fn writes_manifest_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut deck = Deck::new("t", "s");
        deck.add_text("a", "b");
        deck.write_markdown(&dir.path().join("deck.md")).unwrap();
        deck.write_manifest(&dir.path().join("deck.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("deck.json")).unwrap()).unwrap();
        assert_eq!(json["slides"][0]["title"], "a");
        assert!(json["slides"][0]["image"].is_null());
    }
}
