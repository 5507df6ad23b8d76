//! Corpus sources: turn a locator into one text digest ready for ingest.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::SourceConfig;

const FILE_RULE: &str = "================================================";
const BINARY_PROBE_BYTES: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("source is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no readable text files under {}", .0.display())]
    Empty(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Text fetched from a source, keyed for ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub key: String,
    pub text: String,
}

/// Resolves a locator to corpus text.
pub trait CorpusSource: Send + Sync {
    /// Fetch the text behind `locator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator cannot be resolved or yields no text.
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<SourceText, SourceError>> + Send;
}

/// Digests a local checkout: a directory tree followed by every text file.
///
/// `.gitignore` rules apply. Binary files and files above the size limit are
/// skipped with a warning.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    max_file_bytes: u64,
    include_hidden: bool,
}

impl Default for DirectorySource {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

impl DirectorySource {
    #[must_use]
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            include_hidden: config.include_hidden,
        }
    }

    /// Render the digest for `root` on the current thread.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing, is not a directory, or holds no
    /// readable text file.
    pub fn digest(&self, root: &Path) -> Result<String, SourceError> {
        if !root.exists() {
            return Err(SourceError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(SourceError::NotADirectory(root.to_path_buf()));
        }

        let mut files = self.collect(root);
        if files.is_empty() {
            return Err(SourceError::Empty(root.to_path_buf()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut tree = Tree::default();
        for (rel, _) in &files {
            tree.insert(&rel.split('/').collect::<Vec<_>>());
        }

        let root_name = root
            .canonicalize()?
            .file_name()
            .map_or_else(|| ".".to_owned(), |n| n.to_string_lossy().into_owned());
        let mut out = format!("Directory structure:\n└── {root_name}/\n");
        tree.render("    ", &mut out);

        for (rel, content) in &files {
            let _ = write!(out, "\n\n{FILE_RULE}\nFILE: {rel}\n{FILE_RULE}\n{content}");
        }

        tracing::info!(root = %root.display(), files = files.len(), "source digested");
        Ok(out)
    }

    fn collect(&self, root: &Path) -> Vec<(String, String)> {
        let walker = ignore::WalkBuilder::new(root)
            .hidden(!self.include_hidden)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|e| e.file_name() != ".git")
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match self.read_text(entry.path()) {
                Ok(Some(content)) => files.push((rel, content)),
                Ok(None) => {}
                Err(e) => tracing::warn!(file = %rel, "skipping file: {e}"),
            }
        }
        files
    }

    fn read_text(&self, path: &Path) -> std::io::Result<Option<String>> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_file_bytes {
            tracing::warn!(file = %path.display(), size, "skipping oversized file");
            return Ok(None);
        }

        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;
        let probe = &bytes[..bytes.len().min(BINARY_PROBE_BYTES)];
        if probe.contains(&0) {
            tracing::debug!(file = %path.display(), "skipping binary file");
            return Ok(None);
        }

        match String::from_utf8(bytes) {
            Ok(text) => Ok(Some(text)),
            Err(_) => {
                tracing::debug!(file = %path.display(), "skipping non-UTF-8 file");
                Ok(None)
            }
        }
    }
}

impl CorpusSource for DirectorySource {
    async fn fetch(&self, locator: &str) -> Result<SourceText, SourceError> {
        let source = self.clone();
        let root = PathBuf::from(locator);
        let text = tokio::task::spawn_blocking(move || source.digest(&root)).await??;
        Ok(SourceText {
            key: locator.to_owned(),
            text,
        })
    }
}

#[derive(Default)]
struct Tree(BTreeMap<String, Tree>);

impl Tree {
    fn insert(&mut self, parts: &[&str]) {
        if let Some((first, rest)) = parts.split_first() {
            self.0.entry((*first).to_owned()).or_default().insert(rest);
        }
    }

    fn render(&self, prefix: &str, out: &mut String) {
        let last_idx = self.0.len().saturating_sub(1);
        for (i, (name, child)) in self.0.iter().enumerate() {
            let last = i == last_idx;
            let branch = if last { "└── " } else { "├── " };
            let slash = if child.0.is_empty() { "" } else { "/" };
            let _ = writeln!(out, "{prefix}{branch}{name}{slash}");
            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            child.render(&next, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn checkout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", b"[package]\nname = \"widgets\"\n");
        write(dir.path(), "src/main.rs", b"fn main() {}\n");
        write(dir.path(), "src/lib/frob.rs", b"pub fn frob() {}\n");
        dir
    }

    #[test]
    fn digest_renders_tree_and_file_blocks() {
        let dir = checkout();
        let digest = DirectorySource::default().digest(dir.path()).unwrap();

        assert!(digest.starts_with("Directory structure:\n└── "));
        assert!(digest.contains("    ├── Cargo.toml\n    └── src/\n        ├── lib/\n"));
        assert!(digest.contains("        │   └── frob.rs\n        └── main.rs\n"));
        assert!(digest.contains(&format!(
            "{FILE_RULE}\nFILE: src/main.rs\n{FILE_RULE}\nfn main() {{}}\n"
        )));
    }

    #[test]
    fn files_appear_in_path_order() {
        let dir = checkout();
        let digest = DirectorySource::default().digest(dir.path()).unwrap();
        let cargo = digest.find("FILE: Cargo.toml").unwrap();
        let frob = digest.find("FILE: src/lib/frob.rs").unwrap();
        let main = digest.find("FILE: src/main.rs").unwrap();
        assert!(cargo < frob && frob < main);
    }

    #[test]
    fn gitignored_hidden_binary_and_oversized_files_are_skipped() {
        let dir = checkout();
        write(dir.path(), ".gitignore", b"target/\n");
        write(dir.path(), "target/debug/out.txt", b"build output");
        write(dir.path(), ".env", b"SECRET=1");
        write(dir.path(), "logo.png", b"\x89PNG\0\0\0");
        write(dir.path(), "big.txt", &vec![b'a'; 64]);

        let source = DirectorySource::from_config(&SourceConfig {
            max_file_bytes: 32,
            include_hidden: false,
        });
        let digest = source.digest(dir.path()).unwrap();

        assert!(!digest.contains("out.txt"));
        assert!(!digest.contains("SECRET"));
        assert!(!digest.contains("logo.png"));
        assert!(!digest.contains("FILE: big.txt"));
        assert!(digest.contains("FILE: src/main.rs"));
    }

    #[test]
    fn hidden_files_included_when_configured() {
        let dir = checkout();
        write(dir.path(), ".config/settings.toml", b"debug = true\n");

        let source = DirectorySource::from_config(&SourceConfig {
            include_hidden: true,
            ..SourceConfig::default()
        });
        let digest = source.digest(dir.path()).unwrap();
        assert!(digest.contains("FILE: .config/settings.toml"));
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = DirectorySource::default()
            .digest(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = checkout();
        let err = DirectorySource::default()
            .digest(&dir.path().join("Cargo.toml"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotADirectory(_)));
    }

    #[test]
    fn directory_without_text_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blob.bin", b"\0\0\0");
        let err = DirectorySource::default().digest(dir.path()).unwrap_err();
        assert!(matches!(err, SourceError::Empty(_)));
    }

    #[tokio::test]
    async fn fetch_keys_text_by_locator() {
        let dir = checkout();
        let locator = dir.path().to_string_lossy().into_owned();
        let fetched = DirectorySource::default().fetch(&locator).await.unwrap();
        assert_eq!(fetched.key, locator);
        assert!(fetched.text.contains("FILE: src/lib/frob.rs"));
    }
}
