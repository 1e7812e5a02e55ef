use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ReaderError, Result};
use crate::router::{ChapterRoute, RAW_SUFFIX, number_from_file_name};

pub const TRANSLATION_DIR: &str = "translation";
pub const ACCOUNTS_FILE: &str = "acc_list.json";
pub const TRANSLATED_SUFFIX: &str = "_translation.html";
const SHORT_MARKER: &str = "(short)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterCopy {
    Raw,
    Clean,
}

/// One chapter document found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChapter {
    pub bucket: u32,
    pub path: PathBuf,
    pub file_name: String,
    pub number: Option<u32>,
    pub raw: bool,
    pub short: bool,
    pub translated: bool,
}

impl StoredChapter {
    /// File name without the `.html` / `(raw).html` suffix.
    pub fn stem(&self) -> &str {
        let suffix = if self.raw { RAW_SUFFIX } else { ".html" };
        self.file_name
            .strip_suffix(suffix)
            .unwrap_or(&self.file_name)
    }
}

/// `{dest}/{novel}`: hundred buckets of chapter pairs, snapshots and the
/// novel log.
#[derive(Debug, Clone)]
pub struct NovelWorkspace {
    dest: PathBuf,
    novel: String,
    root: PathBuf,
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(0o755);
    }
    builder
        .create(path)
        .map_err(|err| ReaderError::fs("create dir", path, err))
}

impl NovelWorkspace {
    pub fn open(dest: impl Into<PathBuf>, novel: &str) -> Result<Self> {
        let dest = dest.into();
        let root = dest.join(novel);
        create_dir(&root)?;
        Ok(Self {
            dest,
            novel: novel.to_owned(),
            root,
        })
    }

    pub fn novel(&self) -> &str {
        &self.novel
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(format!("{}_main_logfile.log", self.novel))
    }

    pub fn translation_dir(&self) -> PathBuf {
        self.dest.join(TRANSLATION_DIR)
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.dest.join(ACCOUNTS_FILE)
    }

    pub fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.root.join(bucket);
        create_dir(&dir)?;
        Ok(dir)
    }

    /// Writes one copy of a routed chapter and returns its size in bytes.
    pub fn write_chapter(
        &self,
        route: &ChapterRoute,
        copy: ChapterCopy,
        bytes: &[u8],
    ) -> Result<usize> {
        self.bucket_dir(&route.bucket)?;
        let relative = match copy {
            ChapterCopy::Raw => route.raw_path(),
            ChapterCopy::Clean => route.clean_path(),
        };
        let path = self.root.join(relative);
        fs::write(&path, bytes).map_err(|err| ReaderError::fs("write chapter", &path, err))?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "wrote chapter file");
        Ok(bytes.len())
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.root.join(name);
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|err| ReaderError::Parse(format!("encode {name}: {err}")))?;
        fs::write(&path, bytes).map_err(|err| ReaderError::fs("write snapshot", &path, err))
    }

    /// Reads a snapshot written by [`Self::write_json`]; `None` when absent.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.root.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ReaderError::fs("read snapshot", &path, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| ReaderError::Parse(format!("decode {}: {err}", path.display())))
    }

    /// Every stored chapter document, buckets ascending, names sorted
    /// within a bucket.
    pub fn chapter_files(&self) -> Result<Vec<StoredChapter>> {
        let mut buckets = Vec::new();
        let entries =
            fs::read_dir(&self.root).map_err(|err| ReaderError::fs("read dir", &self.root, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| ReaderError::fs("read dir", &self.root, err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(bucket) = name.parse::<u32>() else {
                continue;
            };
            if entry.path().is_dir() {
                buckets.push((bucket, entry.path()));
            }
        }
        buckets.sort();

        let mut chapters = Vec::new();
        for (bucket, dir) in buckets {
            let mut names = Vec::new();
            for entry in fs::read_dir(&dir).map_err(|err| ReaderError::fs("read dir", &dir, err))? {
                let entry = entry.map_err(|err| ReaderError::fs("read dir", &dir, err))?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name.ends_with(".html") && entry.path().is_file() {
                    names.push(file_name);
                }
            }
            names.sort();
            chapters.extend(names.into_iter().map(|file_name| StoredChapter {
                bucket,
                path: dir.join(&file_name),
                number: number_from_file_name(&file_name),
                raw: file_name.ends_with(RAW_SUFFIX),
                short: file_name.contains(SHORT_MARKER),
                translated: file_name.ends_with(TRANSLATED_SUFFIX),
                file_name,
            }));
        }
        Ok(chapters)
    }
}
