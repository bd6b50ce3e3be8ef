//! Plain `KEY=VALUE` text files.
//!
//! Prefix settings and the published wizard endpoint share this format.
//! Comments and unrecognized lines survive a load/save cycle untouched.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Pair { key: String, value: String },
    Other(String),
}

#[derive(Debug, Clone)]
pub struct KeyValueFile {
    path: PathBuf,
    lines: Vec<Line>,
}

impl KeyValueFile {
    /// Load the file at `path`. A missing file loads as empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(Self {
            path,
            lines: parse(&content),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `key`, replacing the existing line in place or appending.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(Line::Pair { value: existing, .. }) = self
            .lines
            .iter_mut()
            .find(|line| matches!(line, Line::Pair { key: k, .. } if k == key))
        {
            *existing = value;
            return;
        }
        self.lines.push(Line::Pair {
            key: key.to_owned(),
            value,
        });
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Pair { key: k, .. } if k == key));
        self.lines.len() != before
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Pair { key, .. } => Some(key.as_str()),
            Line::Other(_) => None,
        })
    }

    /// Write atomically: a temp file in the same directory renamed over
    /// the target.
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(self.render().as_bytes())
            .context("failed to write temp file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "saved key=value file");
        Ok(())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Pair { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Line::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }
}

fn parse(content: &str) -> Vec<Line> {
    content
        .lines()
        .map(|raw| {
            let trimmed = raw.trim_start();
            if trimmed.starts_with('#') {
                return Line::Other(raw.to_owned());
            }
            match raw.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => Line::Pair {
                    key: key.trim().to_owned(),
                    value: value.to_owned(),
                },
                _ => Line::Other(raw.to_owned()),
            }
        })
        .collect()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = KeyValueFile::load(dir.path().join("absent.cfg")).unwrap();
        assert_eq!(file.keys().count(), 0);
    }

    #[test]
    fn preserves_comments_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefix.cfg");
        std::fs::write(&path, "# prefix\nARCH=x86\nVERSION=system\n\nDLL=a=b\n").unwrap();

        let mut file = KeyValueFile::load(&path).unwrap();
        assert_eq!(file.get("DLL"), Some("a=b"));
        file.set("VERSION", "8.0");
        file.set("NEW", "1");
        file.save().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "# prefix\nARCH=x86\nVERSION=8.0\n\nDLL=a=b\nNEW=1\n"
        );
    }

    #[test]
    fn remove_drops_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.cfg");
        std::fs::write(&path, "A=1\nB=2\nA=3\n").unwrap();

        let mut file = KeyValueFile::load(&path).unwrap();
        assert_eq!(file.get("A"), Some("3"));
        assert!(file.remove("A"));
        assert!(!file.remove("A"));
        assert_eq!(file.keys().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/cellar.cfg");
        let mut file = KeyValueFile::load(&path).unwrap();
        file.set("WIZARD_PORT", "30000");
        file.save().unwrap();

        let reloaded = KeyValueFile::load(&path).unwrap();
        assert_eq!(reloaded.get("WIZARD_PORT"), Some("30000"));
    }
}
