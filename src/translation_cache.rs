use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::translator::{first_translation, has_translations};
use crate::workspace::create_dir;

pub const CACHE_FILE: &str = "translations_mini.json";
pub const UNTRANSLATABLE_FILE: &str = "not_translated_word.json";
pub const HUMANIZED_FILE: &str = "translations_humanized.json";
pub const EMPTY_WORDS_FILE: &str = "translations_empty_words.json";
const DUMP_SUFFIX: &str = "_translation.json";

/// Token translations kept across runs. Entries are added, never replaced
/// or evicted; tokens known to have no translation are kept apart so they
/// are not looked up again.
#[derive(Debug, Clone)]
pub struct TranslationCache {
    dir: PathBuf,
    entries: BTreeMap<String, Value>,
    untranslatable: BTreeSet<String>,
}

/// What [`TranslationCache::get_or_fetch`] found for a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    Cached(&'a Value),
    Fetched(&'a Value),
    Untranslatable,
}

fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .with_context(|| format!("encode {}", path.display()))?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

impl TranslationCache {
    /// Loads the cache from `dir`, creating the directory if needed.
    /// Missing or empty files load as empty.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        create_dir(dir)?;
        let entries = read_optional(&dir.join(CACHE_FILE))?;
        let untranslatable: Vec<String> = read_optional(&dir.join(UNTRANSLATABLE_FILE))?;
        let cache = Self {
            dir: dir.to_owned(),
            entries,
            untranslatable: untranslatable.into_iter().collect(),
        };
        tracing::debug!(
            entries = cache.entries.len(),
            untranslatable = cache.untranslatable.len(),
            "loaded translation cache"
        );
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<&Value> {
        self.entries.get(&token.to_lowercase())
    }

    pub fn is_untranslatable(&self, token: &str) -> bool {
        self.untranslatable.contains(&token.to_lowercase())
    }

    /// Adds a payload for a token not cached yet. Returns `false` (and keeps
    /// the existing payload) otherwise.
    pub fn insert(&mut self, token: &str, payload: Value) -> bool {
        let token = token.to_lowercase();
        if self.entries.contains_key(&token) {
            return false;
        }
        self.entries.insert(token, payload);
        true
    }

    pub fn mark_untranslatable(&mut self, token: &str) {
        self.untranslatable.insert(token.to_lowercase());
    }

    /// Serves the lowercased token from the cache, calling `fetch` only for
    /// tokens neither cached nor known to be untranslatable.
    pub fn get_or_fetch<E>(
        &mut self,
        token: &str,
        fetch: impl FnOnce(&str) -> Result<Value, E>,
    ) -> Result<Lookup<'_>, E> {
        let token = token.to_lowercase();
        if self.untranslatable.contains(&token) {
            return Ok(Lookup::Untranslatable);
        }
        if self.entries.contains_key(&token) {
            return Ok(self
                .entries
                .get(&token)
                .map_or(Lookup::Untranslatable, Lookup::Cached));
        }

        let payload = fetch(&token)?;
        if !has_translations(&payload) {
            tracing::debug!(token = %token, "no translation");
            self.untranslatable.insert(token);
            return Ok(Lookup::Untranslatable);
        }
        Ok(Lookup::Fetched(self.entries.entry(token).or_insert(payload)))
    }

    /// Writes the cache and the untranslatable token list.
    pub fn flush(&self) -> anyhow::Result<()> {
        write_json(&self.dir.join(CACHE_FILE), &self.entries, false)?;
        write_json(
            &self.dir.join(UNTRANSLATABLE_FILE),
            &self.untranslatable,
            true,
        )?;
        tracing::info!(
            entries = self.entries.len(),
            untranslatable = self.untranslatable.len(),
            "flushed translation cache"
        );
        Ok(())
    }

    /// Writes a timestamped copy of the cache for this run.
    pub fn dump_run(&self, novel: &str, now: DateTime<Local>) -> anyhow::Result<PathBuf> {
        let stamp = now.format("%Y-%m-%d %H.%M.%S%.6f");
        let path = self.dir.join(format!("{stamp}_{novel}{DUMP_SUFFIX}"));
        write_json(&path, &self.entries, true)?;
        Ok(path)
    }
}

/// Folds every per-run dump in `dir` into the cache file without replacing
/// existing tokens. Returns the merged cache size.
pub fn merge_dumps(dir: &Path) -> anyhow::Result<usize> {
    let mut cache = TranslationCache::load(dir)?;
    let mut dumps = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir {}", dir.display()))?
            .path();
        let is_dump = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(DUMP_SUFFIX));
        if is_dump {
            dumps.push(path);
        }
    }
    dumps.sort();

    for dump in dumps {
        let entries: BTreeMap<String, Value> = read_optional(&dump)?;
        let added = entries
            .into_iter()
            .filter(|(token, payload)| cache.insert(token, payload.clone()))
            .count();
        tracing::debug!(dump = %dump.display(), added, "merged dump");
    }

    write_json(&dir.join(CACHE_FILE), &cache.entries, false)?;
    tracing::info!(entries = cache.len(), "merged translation dumps");
    Ok(cache.len())
}

/// Writes the cache as readable, unescaped UTF-8 JSON.
pub fn humanize(dir: &Path) -> anyhow::Result<PathBuf> {
    create_dir(dir)?;
    let entries: BTreeMap<String, Value> = read_optional(&dir.join(CACHE_FILE))?;
    let path = dir.join(HUMANIZED_FILE);
    write_json(&path, &entries, true)?;
    Ok(path)
}

/// Cached tokens whose first entry carries no translation; also written to
/// the empty-words file.
pub fn empty_entries(dir: &Path) -> anyhow::Result<Vec<String>> {
    create_dir(dir)?;
    let entries: BTreeMap<String, Value> = read_optional(&dir.join(CACHE_FILE))?;
    let empty: Vec<String> = entries
        .iter()
        .filter(|(_, payload)| first_translation(payload).is_none())
        .map(|(token, _)| token.clone())
        .collect();
    write_json(&dir.join(EMPTY_WORDS_FILE), &empty, true)?;
    Ok(empty)
}
