use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::convert::DEFAULT_CONVERTER;
use crate::fetch::{DEFAULT_USER_AGENT, FetchConfig};
use crate::profile::Site;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, clean and store the chapters of a range.
    Read(ReadArgs),
    /// Rebuild clean chapters from stored raw pages.
    Reprocess(ReprocessArgs),
    /// Convert clean chapters to PDF.
    Pdf(PdfArgs),
    Translate {
        #[command(subcommand)]
        command: TranslateCommand,
    },
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
}

impl Command {
    /// Novel-scoped log file for commands that work on one novel.
    pub fn log_file(&self) -> Option<PathBuf> {
        let (dest, novel) = match self {
            Self::Read(args) => (&args.novel.dest, &args.novel.novel),
            Self::Reprocess(args) => (&args.novel.dest, &args.novel.novel),
            Self::Pdf(args) => (&args.novel.dest, &args.novel.novel),
            Self::Translate {
                command: TranslateCommand::Words(args) | TranslateCommand::Chapters(args),
            } => (&args.dest, &args.novel),
            _ => return None,
        };
        Some(dest.join(novel).join(format!("{novel}_main_logfile.log")))
    }
}

#[derive(Debug, Args)]
pub struct NovelArgs {
    #[arg(long, value_enum)]
    pub site: Site,

    /// Novel name as it appears in the site's URLs.
    #[arg(long)]
    pub novel: String,

    /// Root directory of all novel workspaces.
    #[arg(long, default_value = "novels")]
    pub dest: PathBuf,

    /// Replace the site root (e.g. a local mirror).
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Extra attempts for a failed request.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Delay before the first retry; doubles for each further retry.
    #[arg(long, default_value_t = 500)]
    pub retry_backoff_ms: u64,
}

impl FetchArgs {
    pub fn config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
            retries: self.retries,
            backoff_ms: self.retry_backoff_ms,
        }
    }
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub novel: NovelArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// First chapter number (inclusive).
    #[arg(long)]
    pub first: u32,

    /// Last chapter number (inclusive).
    #[arg(long)]
    pub last: u32,

    /// API book id (moboreader); known novels resolve automatically.
    #[arg(long)]
    pub book_id: Option<String>,

    /// How often one short chapter may be fetched again with a fresh token.
    #[arg(long, default_value_t = 3)]
    pub max_short_requeues: u32,
}

#[derive(Debug, Args)]
pub struct ReprocessArgs {
    #[command(flatten)]
    pub novel: NovelArgs,
}

#[derive(Debug, Args)]
pub struct PdfArgs {
    #[command(flatten)]
    pub novel: NovelArgs,

    /// Output directory; PDFs land in `{out}/{novel}/{bucket}`.
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub starting_bucket: u32,

    #[arg(long, default_value_t = 1)]
    pub first: u32,

    #[arg(long, default_value_t = 100_000)]
    pub last: u32,

    #[arg(long, default_value = DEFAULT_CONVERTER)]
    pub converter: String,
}

#[derive(Debug, Subcommand)]
pub enum TranslateCommand {
    /// Look up every new word of the clean chapters.
    Words(TranslateArgs),
    /// Write a translated copy of each clean chapter.
    Chapters(TranslateArgs),
    /// Fold per-run dumps into the cache.
    Merge(CacheArgs),
    /// Write the cache as readable JSON.
    Humanize(CacheArgs),
    /// List cached words without a translation.
    Empty(CacheArgs),
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    #[arg(long)]
    pub novel: String,

    #[arg(long, default_value = "novels")]
    pub dest: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub first: u32,

    #[arg(long, default_value_t = 100_000)]
    pub last: u32,

    #[arg(long, default_value = "en")]
    pub from: String,

    #[arg(long, default_value = "ar")]
    pub to: String,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[arg(long, default_value = "novels")]
    pub dest: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Add or update a moboreader account.
    Add(AccountAddArgs),
}

#[derive(Debug, Args)]
pub struct AccountAddArgs {
    #[arg(long, default_value = "novels")]
    pub dest: PathBuf,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,
}
