use std::cell::Cell;
use std::sync::LazyLock;

use anyhow::Context as _;
use html_escape::encode_text;
use lol_html::html_content::ContentType;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::translation_cache::{Lookup, TranslationCache};
use crate::translator::{Translator, first_translation};
use crate::workspace::{NovelWorkspace, StoredChapter, TRANSLATED_SUFFIX};

static WORD_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("word split regex"));

static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("paragraph selector"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WordPassSummary {
    pub files: usize,
    pub looked_up: usize,
    pub cached: usize,
    pub untranslatable: usize,
    pub failed_files: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChapterPassSummary {
    pub files: usize,
    pub paragraphs: usize,
    pub failed_files: usize,
}

/// Lowercased tokens of a paragraph worth a dictionary lookup.
pub fn word_tokens(text: &str) -> Vec<String> {
    WORD_SPLIT_RE
        .split(text)
        .filter(|token| token.chars().count() > 2)
        .filter(|token| !token.chars().all(|ch| ch.is_ascii_digit()))
        .map(str::to_lowercase)
        .collect()
}

fn paragraph_texts(html: &str) -> Vec<String> {
    Html::parse_document(html)
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<String>().trim().to_owned())
        .collect()
}

fn chapters_in_range(
    workspace: &NovelWorkspace,
    first: u32,
    last: u32,
) -> anyhow::Result<Vec<(u32, StoredChapter)>> {
    let chapters = workspace.chapter_files().context("list chapters")?;
    Ok(chapters
        .into_iter()
        .filter(|chapter| !chapter.raw && !chapter.translated)
        .filter_map(|chapter| chapter.number.map(|number| (number, chapter)))
        .filter(|(number, _)| (first..=last).contains(number))
        .collect())
}

/// Looks up every new token of the clean chapters `first..=last` once.
/// The cache is flushed after a failed file and at the end of the pass,
/// together with a dump of this run.
pub fn word_pass(
    workspace: &NovelWorkspace,
    cache: &mut TranslationCache,
    translator: &Translator,
    first: u32,
    last: u32,
) -> anyhow::Result<WordPassSummary> {
    let mut summary = WordPassSummary::default();

    for (number, chapter) in chapters_in_range(workspace, first, last)? {
        let html = std::fs::read_to_string(&chapter.path)
            .with_context(|| format!("read chapter: {}", chapter.path.display()))?;
        summary.files += 1;

        let mut failure = None;
        'paragraphs: for text in paragraph_texts(&html) {
            for token in word_tokens(&text) {
                match cache.get_or_fetch(&token, |t| translator.lookup_word(t)) {
                    Ok(Lookup::Cached(_)) => summary.cached += 1,
                    Ok(Lookup::Fetched(_)) => summary.looked_up += 1,
                    Ok(Lookup::Untranslatable) => summary.untranslatable += 1,
                    Err(err) => {
                        failure = Some(err);
                        break 'paragraphs;
                    }
                }
            }
        }

        if let Some(err) = failure {
            tracing::warn!(chapter = number, error = %err, "word lookup failed");
            summary.failed_files += 1;
            cache.flush()?;
        }
    }

    cache.flush()?;
    let dump = cache.dump_run(workspace.novel(), chrono::Local::now())?;
    tracing::info!(
        files = summary.files,
        looked_up = summary.looked_up,
        dump = %dump.display(),
        "word pass finished"
    );
    Ok(summary)
}

/// Inserts `translations[i]` as a new paragraph after the `i`-th paragraph.
pub fn insert_translations(html: &str, translations: &[Option<String>]) -> anyhow::Result<String> {
    let index = Cell::new(0_usize);
    let mut output = Vec::with_capacity(html.len() * 2);
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("p", |el| {
                let current = index.get();
                index.set(current + 1);
                if let Some(Some(translation)) = translations.get(current) {
                    el.after(
                        &format!("<p>{}</p>", encode_text(translation)),
                        ContentType::Html,
                    );
                }
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter
        .write(html.as_bytes())
        .context("rewrite translated chapter")?;
    rewriter.end().context("rewrite translated chapter")?;
    String::from_utf8(output).context("translated chapter is not utf-8")
}

/// Translates each non-empty paragraph of the clean chapters `first..=last`
/// and writes `{stem}_translation.html` next to each source.
pub fn chapter_pass(
    workspace: &NovelWorkspace,
    translator: &Translator,
    first: u32,
    last: u32,
) -> anyhow::Result<ChapterPassSummary> {
    let mut summary = ChapterPassSummary::default();

    for (number, chapter) in chapters_in_range(workspace, first, last)? {
        let html = std::fs::read_to_string(&chapter.path)
            .with_context(|| format!("read chapter: {}", chapter.path.display()))?;

        let mut translations = Vec::new();
        let mut failed = false;
        for text in paragraph_texts(&html) {
            let text = text.replace(['\'', '"'], "");
            if text.is_empty() {
                translations.push(None);
                continue;
            }
            match translator.translate_text(&text) {
                Ok(payload) => translations.push(first_translation(&payload)),
                Err(err) => {
                    tracing::warn!(chapter = number, error = %err, "paragraph translation failed");
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            summary.failed_files += 1;
            continue;
        }

        let translated = insert_translations(&html, &translations)?;
        let target = chapter
            .path
            .with_file_name(format!("{}{TRANSLATED_SUFFIX}", chapter.stem()));
        std::fs::write(&target, translated)
            .with_context(|| format!("write translation: {}", target.display()))?;
        summary.files += 1;
        summary.paragraphs += translations.iter().flatten().count();
        tracing::info!(chapter = number, out = %target.display(), "translated chapter");
    }

    Ok(summary)
}
