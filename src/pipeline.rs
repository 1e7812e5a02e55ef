use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assemble::{ChapterShell, Heading, assemble, heading_from_file_name};
use crate::error::{ErrorKind, ReaderError, Result};
use crate::fetch::Fetcher;
use crate::listing::{ChapterRef, page_of, parse_listing_page};
use crate::locate::locate;
use crate::mobo::{AccountPool, ApiChapter, ChapterApi, chapter_file_name, load_accounts};
use crate::profile::{Completeness, HeadingStyle, ListingStrategy, Site, SiteProfile, known_book_id};
use crate::router::{self, ChapterRoute, chapter_marker, normalize_chapter_title};
use crate::strip::strip;
use crate::workspace::{ChapterCopy, NovelWorkspace, StoredChapter};

/// Per-chapter step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Locate,
    Strip,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Locate => "locate",
            Self::Strip => "strip",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct StageError {
    stage: Stage,
    error: ReaderError,
}

type StageResult<T> = std::result::Result<T, StageError>;

trait AtStage<T> {
    fn at(self, stage: Stage) -> StageResult<T>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> StageResult<T> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Why one chapter contributed nothing to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFailure {
    pub number: u32,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ChapterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chapter {} failed at {}: {}",
            self.number, self.stage, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedChapter {
    pub number: u32,
    pub file_name: String,
    pub raw_bytes: u64,
    pub clean_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub raw_bytes: u64,
    pub clean_bytes: u64,
    pub processed: Vec<ProcessedChapter>,
    pub failures: Vec<ChapterFailure>,
    /// Set when a later listing page failed and the walk stopped there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}

impl RunSummary {
    pub fn message(&self) -> String {
        format!(
            "[[Total_Raw_Size:{}, Total_Clean_Size:{}]]",
            self.raw_bytes, self.clean_bytes
        )
    }

    /// A file written again in the same run replaces its earlier record, so
    /// the totals match what is on disk.
    fn record(&mut self, chapter: ProcessedChapter) {
        self.raw_bytes += chapter.raw_bytes;
        self.clean_bytes += chapter.clean_bytes;
        let earlier = self
            .processed
            .iter()
            .position(|earlier| earlier.file_name == chapter.file_name);
        match earlier {
            Some(index) => {
                let replaced = std::mem::replace(&mut self.processed[index], chapter);
                self.raw_bytes -= replaced.raw_bytes;
                self.clean_bytes -= replaced.clean_bytes;
            }
            None => self.processed.push(chapter),
        }
    }

    fn fail(&mut self, number: u32, err: StageError) {
        tracing::warn!(
            chapter = number,
            stage = %err.stage,
            error = %err.error,
            "chapter skipped"
        );
        self.failures.push(ChapterFailure {
            number,
            stage: err.stage,
            kind: err.error.kind(),
            message: err.error.to_string(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// API book id; falls back to the known-novel map.
    pub book_id: Option<String>,
    pub max_short_requeues: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            book_id: None,
            max_short_requeues: 3,
        }
    }
}

pub struct Pipeline {
    profile: SiteProfile,
    workspace: NovelWorkspace,
    fetcher: Fetcher,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        profile: SiteProfile,
        workspace: NovelWorkspace,
        fetcher: Fetcher,
        options: PipelineOptions,
    ) -> Self {
        Self {
            profile,
            workspace,
            fetcher,
            options,
        }
    }

    pub fn workspace(&self) -> &NovelWorkspace {
        &self.workspace
    }

    /// Processes every listed chapter numbered `first..=last`, in ascending
    /// order. Only a failed (first) listing fetch is returned as an error;
    /// chapter failures are recorded in the summary.
    pub fn process_range(&self, first: u32, last: u32) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        if first > last {
            return Ok(summary);
        }
        tracing::info!(
            site = ?self.profile.site,
            novel = self.workspace.novel(),
            first,
            last,
            "processing range"
        );

        match &self.profile.listing {
            ListingStrategy::IndexPage { .. } => {
                let chapters = self.fetch_listing(None)?;
                self.process_pages(chapters, first, last, &mut summary);
            }
            ListingStrategy::Paginated { per_page, .. } => {
                let first_page = page_of(first, *per_page);
                let last_page = page_of(last, *per_page);
                for page in first_page..=last_page {
                    match self.fetch_listing(Some(page)) {
                        Ok(chapters) => self.process_pages(chapters, first, last, &mut summary),
                        Err(err) if page == first_page => return Err(err),
                        Err(err) => {
                            tracing::warn!(page, error = %err, "listing page failed, stopping");
                            summary.halted = Some(format!("listing page {page}: {err}"));
                            break;
                        }
                    }
                }
            }
            ListingStrategy::ChapterApi => self.process_api(first, last, &mut summary)?,
        }

        tracing::info!(
            raw_size = summary.raw_bytes,
            clean_size = summary.clean_bytes,
            processed = summary.processed.len(),
            failed = summary.failures.len(),
            "{}",
            summary.message()
        );
        Ok(summary)
    }

    fn fetch_listing(&self, page: Option<u32>) -> Result<Vec<ChapterRef>> {
        let url = self.profile.listing_url(self.workspace.novel(), page);
        tracing::info!(url = %url, "fetching listing");
        let bytes = self.fetcher.get_bytes(&url, None)?;
        parse_listing_page(&String::from_utf8_lossy(&bytes), &url, &self.profile)
    }

    fn process_pages(
        &self,
        chapters: Vec<ChapterRef>,
        first: u32,
        last: u32,
        summary: &mut RunSummary,
    ) {
        for chapter in chapters
            .into_iter()
            .filter(|chapter| (first..=last).contains(&chapter.number))
        {
            match self.process_html_chapter(&chapter) {
                Ok(processed) => summary.record(processed),
                Err(err) => summary.fail(chapter.number, err),
            }
        }
    }

    fn html_file_name(&self, chapter: &ChapterRef) -> String {
        let marker = chapter_marker(chapter.number);
        let candidate = match self.profile.site {
            Site::DivineDaoLibrary => format!("{marker}_{}", chapter.title),
            _ => normalize_chapter_title(chapter.number, &chapter.title),
        };
        router::file_name(chapter.number, &candidate, self.profile.name_policy)
    }

    fn process_html_chapter(&self, chapter: &ChapterRef) -> StageResult<ProcessedChapter> {
        tracing::debug!(chapter = chapter.number, url = %chapter.source_locator, "reading chapter");
        let bytes = self
            .fetcher
            .get_bytes(&chapter.source_locator, None)
            .at(Stage::Fetch)?;

        let file_name = self.html_file_name(chapter);
        let route = router::route(chapter.number, &file_name);
        if self.profile.keep_raw {
            self.workspace
                .write_chapter(&route, ChapterCopy::Raw, &bytes)
                .at(Stage::Persist)?;
        }

        let document = String::from_utf8_lossy(&bytes);
        let clean_bytes =
            self.clean_document(&document, &route, &file_name, &chapter.source_locator)?;
        let processed = ProcessedChapter {
            number: chapter.number,
            file_name,
            raw_bytes: bytes.len() as u64,
            clean_bytes,
            completeness: None,
        };
        log_processed(&processed);
        Ok(processed)
    }

    /// Locate, strip, assemble and persist the clean copy of one chapter page.
    fn clean_document(
        &self,
        document: &str,
        route: &ChapterRoute,
        title: &str,
        source_url: &str,
    ) -> StageResult<u64> {
        let selector = &self.profile.content_selector;
        let mut content = locate(document, selector).at(Stage::Locate)?;
        strip(&mut content, &self.profile.noise).at(Stage::Strip)?;
        let headings = match self.profile.heading {
            HeadingStyle::FromFileName => vec![Heading {
                level: 3,
                class: None,
                text: heading_from_file_name(&route.file_name),
            }],
            _ => Vec::new(),
        };
        let clean = assemble(
            &content,
            &ChapterShell {
                title,
                headings,
                source_url,
            },
        );
        let written = self
            .workspace
            .write_chapter(route, ChapterCopy::Clean, clean.as_bytes())
            .at(Stage::Persist)?;
        Ok(written as u64)
    }

    fn process_api(&self, first: u32, last: u32, summary: &mut RunSummary) -> Result<()> {
        let novel = self.workspace.novel();
        let book_id = self
            .options
            .book_id
            .clone()
            .or_else(|| known_book_id(novel).map(str::to_owned))
            .ok_or_else(|| ReaderError::Parse(format!("no book id known for {novel}")))?;
        let api = ChapterApi::new(&self.fetcher, &self.profile.base_url, &book_id);

        let mut queue: VecDeque<ApiChapter> = api
            .chapter_list(&self.workspace)?
            .into_iter()
            .filter(|chapter| (first..=last).contains(&chapter.serial_number))
            .collect();

        let accounts = match load_accounts(&self.workspace.accounts_path()) {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable account store");
                Default::default()
            }
        };
        let mut pool = AccountPool::new(accounts, api.login_url());
        let mut exhausted = false;
        let mut token = match pool.refresh(&self.fetcher) {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!(error = %err, "reading without a token");
                exhausted = true;
                None
            }
        };

        let mut requeued: HashMap<u64, u32> = HashMap::new();
        while let Some(chapter) = queue.pop_front() {
            let processed = match self.process_api_chapter(&api, &chapter, token.as_deref()) {
                Ok(processed) => processed,
                Err(err) => {
                    summary.fail(chapter.serial_number, err);
                    continue;
                }
            };
            let short = processed.completeness == Some(Completeness::Short);
            summary.record(processed);
            if !short || exhausted {
                continue;
            }

            let count = requeued.entry(chapter.chapter_id).or_default();
            if *count >= self.options.max_short_requeues {
                tracing::debug!(
                    chapter = chapter.serial_number,
                    "short chapter not re-queued again"
                );
                continue;
            }
            match pool.refresh(&self.fetcher) {
                Ok(fresh) => {
                    *count += 1;
                    tracing::info!(
                        chapter = chapter.serial_number,
                        attempt = *count,
                        "re-queue short chapter"
                    );
                    token = Some(fresh);
                    queue.push_front(chapter);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "short chapters will not be re-queued");
                    exhausted = true;
                }
            }
        }
        Ok(())
    }

    fn process_api_chapter(
        &self,
        api: &ChapterApi<'_>,
        chapter: &ApiChapter,
        token: Option<&str>,
    ) -> StageResult<ProcessedChapter> {
        let (body, raw_bytes) = api
            .read_chapter(chapter.chapter_id, token)
            .at(Stage::Fetch)?;
        let completeness = body.completeness();
        let file_name = chapter_file_name(chapter, completeness);
        let route = router::route(chapter.serial_number, &file_name);

        let selector = &self.profile.content_selector;
        let mut content = locate(&body.to_document(), selector).at(Stage::Locate)?;
        strip(&mut content, &self.profile.noise).at(Stage::Strip)?;
        let headings = match self.profile.heading {
            HeadingStyle::NovelAndChapter => vec![
                Heading {
                    level: 3,
                    class: Some("name"),
                    text: self.workspace.novel().to_owned(),
                },
                Heading {
                    level: 4,
                    class: Some("name"),
                    text: chapter.chapter_name.clone(),
                },
            ],
            _ => Vec::new(),
        };
        let chapter_url = api.chapter_url(chapter.chapter_id);
        let clean = assemble(
            &content,
            &ChapterShell {
                title: &chapter.chapter_name,
                headings,
                source_url: &chapter_url,
            },
        );
        let clean_bytes = self
            .workspace
            .write_chapter(&route, ChapterCopy::Clean, clean.as_bytes())
            .at(Stage::Persist)?;

        let processed = ProcessedChapter {
            number: chapter.serial_number,
            file_name,
            raw_bytes: raw_bytes as u64,
            clean_bytes: clean_bytes as u64,
            completeness: Some(completeness),
        };
        log_processed(&processed);
        Ok(processed)
    }

    /// Rebuilds every clean copy from the stored raw pages, without network
    /// access. Clean copies keep the raw file's name and carry no source link.
    pub fn reprocess_raw(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for stored in self.workspace.chapter_files()? {
            if !stored.raw {
                continue;
            }
            let Some(number) = stored.number else {
                tracing::debug!(file = %stored.file_name, "skip raw file without chapter number");
                continue;
            };
            match self.reprocess_one(&stored, number) {
                Ok(processed) => {
                    log_processed(&processed);
                    summary.record(processed);
                }
                Err(err) => summary.fail(number, err),
            }
        }
        tracing::info!("{}", summary.message());
        Ok(summary)
    }

    fn reprocess_one(&self, stored: &StoredChapter, number: u32) -> StageResult<ProcessedChapter> {
        let route = ChapterRoute {
            bucket: format!("{:05}", stored.bucket),
            file_name: stored.stem().to_owned(),
        };
        let bytes = std::fs::read(&stored.path)
            .map_err(|err| ReaderError::fs("read raw chapter", &stored.path, err))
            .at(Stage::Fetch)?;
        let document = String::from_utf8_lossy(&bytes);
        let clean_bytes = self.clean_document(&document, &route, &route.file_name, "")?;
        Ok(ProcessedChapter {
            number,
            file_name: route.file_name,
            raw_bytes: bytes.len() as u64,
            clean_bytes,
            completeness: None,
        })
    }
}

fn log_processed(chapter: &ProcessedChapter) {
    tracing::info!(
        chapter = chapter.number,
        file_name = %chapter.file_name,
        raw_size = chapter.raw_bytes,
        clean_size = chapter.clean_bytes,
        "processed chapter"
    );
}
