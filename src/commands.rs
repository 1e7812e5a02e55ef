use anyhow::Context as _;

use crate::cli::{
    AccountAddArgs, CacheArgs, NovelArgs, PdfArgs, ReadArgs, ReprocessArgs, TranslateArgs,
};
use crate::convert::{ConvertOptions, ConvertSummary, convert};
use crate::fetch::Fetcher;
use crate::mobo::set_account;
use crate::pipeline::{Pipeline, PipelineOptions, RunSummary};
use crate::profile::{ListingStrategy, SiteProfile};
use crate::translate::{ChapterPassSummary, WordPassSummary, chapter_pass, word_pass};
use crate::translation_cache::{self, TranslationCache};
use crate::translator::{Translator, TranslatorConfig};
use crate::workspace::{NovelWorkspace, TRANSLATION_DIR};

fn open_workspace(novel: &NovelArgs) -> anyhow::Result<NovelWorkspace> {
    NovelWorkspace::open(&novel.dest, &novel.novel).context("open workspace")
}

pub fn read(args: ReadArgs) -> anyhow::Result<RunSummary> {
    let profile =
        SiteProfile::for_site(args.novel.site).with_base_url(args.novel.base_url.as_deref());
    let workspace = open_workspace(&args.novel)?;
    let fetcher = Fetcher::new(args.fetch.config())?;
    let pipeline = Pipeline::new(
        profile,
        workspace,
        fetcher,
        PipelineOptions {
            book_id: args.book_id,
            max_short_requeues: args.max_short_requeues,
        },
    );
    pipeline
        .process_range(args.first, args.last)
        .with_context(|| format!("read chapters {}..={}", args.first, args.last))
}

pub fn reprocess(args: ReprocessArgs) -> anyhow::Result<RunSummary> {
    let profile = SiteProfile::for_site(args.novel.site);
    if matches!(profile.listing, ListingStrategy::ChapterApi) {
        anyhow::bail!("{:?} keeps no raw pages to reprocess", args.novel.site);
    }
    let workspace = open_workspace(&args.novel)?;
    let pipeline = Pipeline::new(
        profile,
        workspace,
        Fetcher::new(Default::default())?,
        PipelineOptions::default(),
    );
    pipeline.reprocess_raw().context("reprocess raw pages")
}

pub fn pdf(args: PdfArgs) -> anyhow::Result<ConvertSummary> {
    let workspace = open_workspace(&args.novel)?;
    let options = ConvertOptions {
        out_dir: args.out,
        converter: args.converter,
        starting_bucket: args.starting_bucket,
        first: args.first,
        last: args.last,
    };
    convert(&workspace, &options)
}

fn translator(args: &TranslateArgs) -> anyhow::Result<Translator> {
    let config = TranslatorConfig::from_env(&args.from, &args.to)?;
    Ok(Translator::new(Fetcher::new(args.fetch.config())?, config))
}

pub fn translate_words(args: TranslateArgs) -> anyhow::Result<WordPassSummary> {
    let workspace = NovelWorkspace::open(&args.dest, &args.novel).context("open workspace")?;
    let translator = translator(&args)?;
    let mut cache =
        TranslationCache::load(&workspace.translation_dir()).context("load translation cache")?;
    word_pass(&workspace, &mut cache, &translator, args.first, args.last)
}

pub fn translate_chapters(args: TranslateArgs) -> anyhow::Result<ChapterPassSummary> {
    let workspace = NovelWorkspace::open(&args.dest, &args.novel).context("open workspace")?;
    let translator = translator(&args)?;
    chapter_pass(&workspace, &translator, args.first, args.last)
}

pub fn merge(args: CacheArgs) -> anyhow::Result<usize> {
    translation_cache::merge_dumps(&args.dest.join(TRANSLATION_DIR))
}

pub fn humanize(args: CacheArgs) -> anyhow::Result<std::path::PathBuf> {
    translation_cache::humanize(&args.dest.join(TRANSLATION_DIR))
}

pub fn empty(args: CacheArgs) -> anyhow::Result<Vec<String>> {
    translation_cache::empty_entries(&args.dest.join(TRANSLATION_DIR))
}

pub fn account_add(args: AccountAddArgs) -> anyhow::Result<()> {
    set_account(
        &args.dest.join(crate::workspace::ACCOUNTS_FILE),
        &args.email,
        &args.password,
    )
}
