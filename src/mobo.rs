use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReaderError, Result};
use crate::fetch::Fetcher;
use crate::profile::{Completeness, FULL_CHAPTER_THRESHOLD};
use crate::router::{self, NamePolicy};
use crate::workspace::NovelWorkspace;

pub const BOOK_DETAIL_FILE: &str = "book_detail.json";
pub const CHAPTER_LIST_FILE: &str = "chapter_list.json";

static CHAPTER_NAME_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d*[\s\-_]*chapter[\s\-_]*\d+").expect("chapter name marker regex")
});

/// `{ "data": ... }` wrapper around every API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub chapter_num: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterListData {
    #[serde(default)]
    chapter_list: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChapter {
    pub chapter_id: u64,
    pub chapter_name: String,
    pub serial_number: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterBody {
    #[serde(default)]
    pub first_content: String,
    #[serde(default)]
    pub last_content: String,
}

impl ChapterBody {
    /// Whether the first part, wrapped in its `div`, is long enough to be
    /// the whole chapter rather than a preview.
    pub fn completeness(&self) -> Completeness {
        let wrapped = self.first_content.chars().count() + "<div></div>".len();
        if wrapped >= FULL_CHAPTER_THRESHOLD {
            Completeness::Full
        } else {
            Completeness::Short
        }
    }

    /// Both parts separated by a rule, as a document the content selector
    /// can locate.
    pub fn to_document(&self) -> String {
        format!(
            "<html><body><div><div>{}</div><hr><div>{}</div></div></body></html>",
            self.first_content, self.last_content
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LoginData {
    accesstoken: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    pwd: &'a str,
    login_type: u8,
}

/// `Chapter_{serial}_{id}_{(full)|(short)} {name}` with the chapter marker
/// cleared from the API name.
pub fn chapter_file_name(chapter: &ApiChapter, completeness: Completeness) -> String {
    let name = CHAPTER_NAME_MARKER_RE.replace_all(&chapter.chapter_name, "");
    let candidate = format!(
        "Chapter_{:05}_{:05}_{} {}",
        chapter.serial_number,
        chapter.chapter_id,
        completeness.label(),
        name
    );
    router::file_name(chapter.serial_number, &candidate, NamePolicy::Space)
}

pub struct ChapterApi<'a> {
    fetcher: &'a Fetcher,
    base_url: &'a str,
    book_id: &'a str,
}

impl<'a> ChapterApi<'a> {
    pub fn new(fetcher: &'a Fetcher, base_url: &'a str, book_id: &'a str) -> Self {
        Self {
            fetcher,
            base_url,
            book_id,
        }
    }

    pub fn chapter_url(&self, chapter_id: u64) -> String {
        format!(
            "{}/Book/ChapterRead?bookId={}&chapterId={chapter_id}",
            self.base_url, self.book_id
        )
    }

    pub fn login_url(&self) -> String {
        format!("{}/User/Login", self.base_url)
    }

    /// Chapter list of the book, read from the workspace snapshot when one
    /// exists and fetched (and snapshotted) otherwise. Entries that do not
    /// decode are skipped.
    pub fn chapter_list(&self, workspace: &NovelWorkspace) -> Result<Vec<ApiChapter>> {
        let list = match workspace.read_json::<Value>(CHAPTER_LIST_FILE)? {
            Some(list) => list,
            None => self.fetch_chapter_list(workspace)?,
        };
        let data: Envelope<ChapterListData> = serde_json::from_value(list)
            .map_err(|err| ReaderError::Parse(format!("{CHAPTER_LIST_FILE}: {err}")))?;

        let mut chapters: Vec<ApiChapter> = data
            .data
            .chapter_list
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        chapters.sort_by_key(|chapter| chapter.serial_number);
        Ok(chapters)
    }

    fn fetch_chapter_list(&self, workspace: &NovelWorkspace) -> Result<Value> {
        let detail_url = format!("{}/Book/BookDetail?bookId={}", self.base_url, self.book_id);
        let (detail, _) = self.fetcher.get_json::<Value>(&detail_url, None)?;
        workspace.write_json(BOOK_DETAIL_FILE, &detail)?;
        let detail: Envelope<BookDetail> = serde_json::from_value(detail)
            .map_err(|err| ReaderError::fetch(&detail_url, format!("malformed payload: {err}")))?;

        let list_url = format!(
            "{}/Book/ChapterList?bookId={}&pageIndex=1&pageSize={}",
            self.base_url, self.book_id, detail.data.chapter_num
        );
        let (list, _) = self.fetcher.get_json::<Value>(&list_url, None)?;
        workspace.write_json(CHAPTER_LIST_FILE, &list)?;
        tracing::info!(chapters = detail.data.chapter_num, "fetched chapter list");
        Ok(list)
    }

    /// Chapter body and payload size in bytes.
    pub fn read_chapter(
        &self,
        chapter_id: u64,
        token: Option<&str>,
    ) -> Result<(ChapterBody, usize)> {
        let (body, size) = self
            .fetcher
            .get_json::<Envelope<ChapterBody>>(&self.chapter_url(chapter_id), token)?;
        Ok((body.data, size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub passw: String,
}

pub type AccountStore = BTreeMap<String, AccountEntry>;

/// Missing file means no accounts yet.
pub fn load_accounts(path: &Path) -> anyhow::Result<AccountStore> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(AccountStore::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("read accounts: {}", path.display()));
        }
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parse accounts: {}", path.display()))
}

/// Inserts or updates one account in the store at `path`.
pub fn set_account(path: &Path, email: &str, password: &str) -> anyhow::Result<()> {
    let mut accounts = load_accounts(path)?;
    accounts.insert(
        email.to_owned(),
        AccountEntry {
            passw: password.to_owned(),
        },
    );
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create accounts dir: {}", parent.display()))?;
    }
    let json = serde_json::to_vec(&accounts).context("encode accounts")?;
    std::fs::write(path, json).with_context(|| format!("write accounts: {}", path.display()))?;
    tracing::info!(email, "saved account");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Account {
    email: String,
    password: String,
}

/// Accounts still usable for a login in this run. Each one is used at
/// most once.
#[derive(Debug, Clone)]
pub struct AccountPool {
    accounts: VecDeque<Account>,
    login_url: String,
}

impl AccountPool {
    pub fn new(store: AccountStore, login_url: impl Into<String>) -> Self {
        let accounts = store
            .into_iter()
            .map(|(email, entry)| Account {
                email,
                password: entry.passw,
            })
            .collect();
        Self {
            accounts,
            login_url: login_url.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.accounts.len()
    }

    /// Logs in with the next account and returns its bearer token. Failed
    /// logins consume their account too.
    pub fn refresh(&mut self, fetcher: &Fetcher) -> Result<String> {
        while let Some(account) = self.accounts.pop_front() {
            let request = LoginRequest {
                email: &account.email,
                pwd: &account.password,
                login_type: 0,
            };
            match fetcher.post_json::<_, Envelope<LoginData>>(&self.login_url, &request) {
                Ok(response) => {
                    tracing::info!(
                        email = %account.email,
                        remaining = self.accounts.len(),
                        "logged in"
                    );
                    return Ok(response.data.accesstoken);
                }
                Err(err) => {
                    tracing::warn!(email = %account.email, error = %err, "login failed");
                }
            }
        }
        tracing::warn!("all accounts have been consumed");
        Err(ReaderError::CredentialExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(name: &str) -> ApiChapter {
        ApiChapter {
            chapter_id: 389_358,
            chapter_name: name.to_owned(),
            serial_number: 12,
        }
    }

    #[test]
    fn file_name_clears_marker_and_replaces_forbidden_chars() {
        let name = chapter_file_name(&chapter("12 Chapter 12: Storm?"), Completeness::Short);
        assert_eq!(name, "Chapter_00012_389358_(short)   Storm");

        let name = chapter_file_name(&chapter("Chapter 12 The Gate"), Completeness::Full);
        assert_eq!(name, "Chapter_00012_389358_(full)  The Gate");
    }

    #[test]
    fn completeness_counts_the_wrapped_first_part() {
        let mut body = ChapterBody {
            first_content: "a".repeat(FULL_CHAPTER_THRESHOLD - 11),
            last_content: String::new(),
        };
        assert_eq!(body.completeness(), Completeness::Full);
        body.first_content.pop();
        assert_eq!(body.completeness(), Completeness::Short);
    }

    #[test]
    fn chapter_body_decodes_with_missing_parts() -> anyhow::Result<()> {
        let body: Envelope<ChapterBody> =
            serde_json::from_str(r#"{"data":{"firstContent":"<p>x</p>"}}"#)?;
        assert_eq!(body.data.first_content, "<p>x</p>");
        assert!(body.data.last_content.is_empty());
        assert!(
            body.data
                .to_document()
                .contains("<div><p>x</p></div><hr><div></div>")
        );
        Ok(())
    }

    #[test]
    fn account_store_tolerates_missing_file_and_updates_entries() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("acc_list.json");
        assert!(load_accounts(&path)?.is_empty());

        set_account(&path, "a@example.com", "one")?;
        set_account(&path, "b@example.com", "two")?;
        set_account(&path, "a@example.com", "three")?;

        let accounts = load_accounts(&path)?;
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts["a@example.com"].passw, "three");
        let raw = std::fs::read_to_string(&path)?;
        assert!(raw.contains(r#""b@example.com":{"passw":"two"}"#));
        Ok(())
    }

    #[test]
    fn empty_pool_is_exhausted() -> anyhow::Result<()> {
        let fetcher = Fetcher::new(crate::fetch::FetchConfig::default())?;
        let mut pool = AccountPool::new(AccountStore::new(), "http://127.0.0.1:9/User/Login");
        let err = pool.refresh(&fetcher).unwrap_err();
        assert!(matches!(err, ReaderError::CredentialExhausted));
        Ok(())
    }
}
