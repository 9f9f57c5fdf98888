//! Artifact writer with timestamped, collision-checked file names.
//!
//! Files are named `<logical_name>_<slug(subject)>_<YYYYMMDD_HHMMSS>.md`
//! and opened with create-new semantics, so an existing file is never
//! overwritten. There is no manifest: artifacts are discovered by file
//! name pattern only. Logical names are restricted to `[a-z0-9-]` so the
//! first `_` always ends the logical name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::domain::Artifact;

/// Maximum slug length in characters
const MAX_SLUG_LEN: usize = 50;

/// Highest counter tried under the suffix policy
const MAX_SUFFIX: u32 = 1000;

/// Errors raised while persisting or reading artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact path already exists: {}", path.display())]
    Collision { path: PathBuf },

    #[error("artifact I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact logical name '{0}': use lowercase letters, digits and '-'")]
    InvalidName(String),

    #[error("invalid artifact pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// What to do when the computed path already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Fail the write
    #[default]
    Fail,

    /// Append `_2`, `_3`, ... to the file stem until a free name is found
    Suffix,
}

/// Source of artifact timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock in local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Persists step outputs into an output directory
#[derive(Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    clock: Arc<dyn Clock>,
    collision: CollisionPolicy,
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("output_dir", &self.output_dir)
            .field("collision", &self.collision)
            .finish()
    }
}

impl ArtifactWriter {
    /// Create a writer targeting `output_dir` (created on first write)
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            clock: Arc::new(SystemClock),
            collision: CollisionPolicy::default(),
        }
    }

    /// Use a different timestamp source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different collision policy
    pub fn with_collision_policy(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision
    }

    /// File stem for an artifact written at `at`
    pub fn file_stem(logical_name: &str, subject: &str, at: DateTime<Local>) -> String {
        format!(
            "{}_{}_{}",
            logical_name,
            slugify(subject),
            at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write `content` to a new file and return its record
    pub async fn write(
        &self,
        logical_name: &str,
        subject: &str,
        content: &str,
    ) -> Result<Artifact, ArtifactError> {
        if !is_logical_name(logical_name) {
            return Err(ArtifactError::InvalidName(logical_name.to_string()));
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| ArtifactError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        let stem = Self::file_stem(logical_name, subject, self.clock.now());
        let mut attempt = 1u32;

        loop {
            let file_name = if attempt == 1 {
                format!("{}.md", stem)
            } else {
                format!("{}_{}.md", stem, attempt)
            };
            let path = self.output_dir.join(file_name);

            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match opened {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(content.as_bytes()).await?;
                        file.flush().await
                    }
                    .await;
                    drop(file);

                    if let Err(source) = written {
                        return Err(discard_partial(path, source).await);
                    }

                    info!(path = %path.display(), bytes = content.len(), "Artifact written");
                    return Ok(Artifact::new(
                        logical_name.to_string(),
                        subject.to_string(),
                        path,
                        content,
                    ));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.collision == CollisionPolicy::Suffix && attempt < MAX_SUFFIX {
                        attempt += 1;
                        continue;
                    }
                    warn!(path = %path.display(), "Artifact path already exists");
                    return Err(ArtifactError::Collision { path });
                }
                Err(source) => return Err(ArtifactError::Io { path, source }),
            }
        }
    }

    /// Read an artifact's content back
    pub async fn read(&self, artifact: &Artifact) -> Result<String, ArtifactError> {
        fs::read_to_string(&artifact.path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: artifact.path.clone(),
                source,
            })
    }

    /// List artifact files, optionally restricted to one logical name
    pub fn discover(&self, logical_name: Option<&str>) -> Result<Vec<PathBuf>, ArtifactError> {
        let dir = glob::Pattern::escape(&self.output_dir.to_string_lossy());
        let prefix = match logical_name {
            Some(name) => glob::Pattern::escape(name),
            None => "*".to_string(),
        };
        let pattern = format!("{}/{}_*.md", dir, prefix);

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter(|path| {
                let parsed = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(logical_name_of);
                match (parsed, logical_name) {
                    (Some(found), Some(wanted)) => found == wanted,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
            .collect();
        paths.sort();

        Ok(paths)
    }
}

/// Remove a file left half-written by a failed write
async fn discard_partial(path: PathBuf, source: std::io::Error) -> ArtifactError {
    if let Err(e) = fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial artifact");
    }
    ArtifactError::Io { path, source }
}

fn is_logical_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Logical name of an artifact file name, if it follows the naming layout
///
/// Accepts `<logical>_<slug>_<YYYYMMDD>_<HHMMSS>.md` with an optional
/// `_<n>` collision counter before the extension.
pub fn logical_name_of(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".md")?;
    let (logical, rest) = stem.split_once('_')?;
    if !is_logical_name(logical) {
        return None;
    }

    let rest = match rest.rsplit_once('_') {
        Some((head, counter))
            if counter.len() < 6 && counter.bytes().all(|b| b.is_ascii_digit()) =>
        {
            head
        }
        _ => rest,
    };

    // `_YYYYMMDD_HHMMSS` plus at least one slug character
    const STAMP_LEN: usize = 16;
    if rest.len() <= STAMP_LEN || !rest.is_char_boundary(rest.len() - STAMP_LEN) {
        return None;
    }
    let (slug, stamp) = rest.split_at(rest.len() - STAMP_LEN);
    let stamp = stamp.strip_prefix('_')?;
    if slug.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit() || b == b'_') {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").ok()?;

    Some(logical)
}

/// Normalize a subject into a filesystem-safe slug
///
/// Lowercases, keeps ASCII alphanumerics and `-`, maps everything else to
/// `_`, collapses repeats, trims the ends and caps the length. Subjects
/// that differ only in whitespace or punctuation share a slug.
pub fn slugify(subject: &str) -> String {
    let mut slug = String::with_capacity(subject.len());

    for c in subject.chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '_'
        };
        if mapped == '_' && (slug.is_empty() || slug.ends_with('_')) {
            continue;
        }
        slug.push(mapped);
    }

    let mut slug: String = slug.trim_end_matches('_').chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('_') {
        slug.pop();
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        ))
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blog Scheduler"), "blog_scheduler");
        assert_eq!(slugify("  Blog   Scheduler "), "blog_scheduler");
        assert_eq!(slugify("CI/CD Pipeline"), "ci_cd_pipeline");
        assert_eq!(slugify("dark-mode toggle!"), "dark-mode_toggle");
        assert_eq!(slugify("???"), "untitled");
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify(&"a".repeat(80)).len(), 50);
    }

    #[test]
    fn test_file_stem() {
        let at = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            ArtifactWriter::file_stem("prd", "Blog Scheduler", at),
            "prd_blog_scheduler_20250314_092653"
        );
    }

    #[tokio::test]
    async fn test_write_and_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path().join("out")).with_clock(fixed_clock());

        let content = "# PRD\n\nÜnïcödé and trailing whitespace  \n";
        let artifact = writer.write("prd", "Blog Scheduler", content).await.unwrap();

        assert_eq!(
            artifact.path,
            temp.path().join("out").join("prd_blog_scheduler_20250314_092653.md")
        );
        assert_eq!(writer.read(&artifact).await.unwrap(), content);
        assert!(artifact.matches(content));
    }

    #[tokio::test]
    async fn test_collision_fails_by_default() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).with_clock(fixed_clock());

        let first = writer.write("prd", "Blog Scheduler", "first").await.unwrap();
        let result = writer.write("prd", "Blog  Scheduler ", "second").await;

        match result {
            Err(ArtifactError::Collision { path }) => assert_eq!(path, first.path),
            other => panic!("Expected Collision, got {:?}", other),
        }
        // The first file is untouched
        assert_eq!(writer.read(&first).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_suffix_policy_finds_free_name() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path())
            .with_clock(fixed_clock())
            .with_collision_policy(CollisionPolicy::Suffix);

        let first = writer.write("prd", "Blog", "one").await.unwrap();
        let second = writer.write("prd", "Blog", "two").await.unwrap();

        assert_ne!(first.path, second.path);
        assert!(second
            .path
            .to_string_lossy()
            .ends_with("prd_blog_20250314_092653_2.md"));
    }

    #[tokio::test]
    async fn test_discover_by_prefix() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).with_clock(fixed_clock());

        writer.write("prd", "Blog", "prd").await.unwrap();
        writer.write("ticket", "Blog", "ticket").await.unwrap();
        std::fs::write(temp.path().join("notes.md"), "not an artifact").unwrap();

        assert_eq!(writer.discover(None).unwrap().len(), 2);

        let prds = writer.discover(Some("prd")).unwrap();
        assert_eq!(prds.len(), 1);
        assert!(prds[0].ends_with("prd_blog_20250314_092653.md"));
    }

    #[test]
    fn test_logical_name_of() {
        assert_eq!(logical_name_of("prd_blog_scheduler_20250314_092653.md"), Some("prd"));
        assert_eq!(logical_name_of("prd_blog_20250314_092653_2.md"), Some("prd"));
        assert_eq!(logical_name_of("prd_v2_20250314_092653.md"), Some("prd"));
        assert_eq!(logical_name_of("prd_20250314_092653.md"), None);
        assert_eq!(logical_name_of("prd_blog_20251399_092653.md"), None);
        assert_eq!(logical_name_of("prd_blog_2025_final.md"), None);
        assert_eq!(logical_name_of("PRD_blog_20250314_092653.md"), None);
        assert_eq!(logical_name_of("notes.md"), None);
    }

    #[tokio::test]
    async fn test_discover_ignores_look_alike_names() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).with_clock(fixed_clock());

        writer.write("prd", "Blog", "prd").await.unwrap();
        writer.write("prd-draft", "Blog", "draft").await.unwrap();
        for stray in ["prd_draft_x_2025_notes.md", "prd_blog_20250314_0926.md"] {
            std::fs::write(temp.path().join(stray), "not an artifact").unwrap();
        }

        let prds = writer.discover(Some("prd")).unwrap();
        assert_eq!(prds.len(), 1);
        assert!(prds[0].ends_with("prd_blog_20250314_092653.md"));
        assert_eq!(writer.discover(None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_write_rejects_ambiguous_logical_name() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).with_clock(fixed_clock());

        let result = writer.write("prd_draft", "Blog", "x").await;
        assert!(matches!(result, Err(ArtifactError::InvalidName(name)) if name == "prd_draft"));
        assert!(writer.discover(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).with_clock(fixed_clock());

        let stem = ArtifactWriter::file_stem("prd", "Blog", fixed_clock().now());
        let path = temp.path().join(format!("{}.md", stem));
        std::fs::write(&path, "half of a docu").unwrap();

        let source = std::io::Error::new(ErrorKind::Other, "disk full");
        let err = discard_partial(path.clone(), source).await;
        assert!(matches!(err, ArtifactError::Io { path: ref p, .. } if *p == path));
        assert!(!path.exists());

        // A retry in the same second gets the same name instead of a collision
        let artifact = writer.write("prd", "Blog", "whole document").await.unwrap();
        assert_eq!(artifact.path, path);
    }
}
