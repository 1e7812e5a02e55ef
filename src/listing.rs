use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ReaderError, Result};
use crate::locate::parse_selector;
use crate::profile::{ListingStrategy, Site, SiteProfile};

static DIVINE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)chapter[\s*\-_]*(\d+)[\-_]([\w \s\-_()\[\].'"]+)"#)
        .expect("divinedaolibrary href regex")
});

static CHAPTER_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[\s*\-_]*(\d+)").expect("chapter number regex"));

/// One chapter to process, as found in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub number: u32,
    pub title: String,
    pub source_locator: String,
}

/// Listing page holding `chapter`, for paginated indexes (pages start at 1).
pub fn page_of(chapter: u32, per_page: u32) -> u32 {
    chapter.div_ceil(per_page.max(1)).max(1)
}

/// Chapter references found in one listing page, in ascending chapter order.
/// Entries without a recognizable chapter number are skipped.
pub fn parse_listing_page(
    html: &str,
    page_url: &str,
    profile: &SiteProfile,
) -> Result<Vec<ChapterRef>> {
    let entry_selector = match &profile.listing {
        ListingStrategy::IndexPage { entry_selector }
        | ListingStrategy::Paginated { entry_selector, .. } => entry_selector,
        ListingStrategy::ChapterApi => {
            return Err(ReaderError::Parse(format!("{:?} has no html listing", profile.site)));
        }
    };
    let selector = parse_selector(entry_selector)?;
    let base =
        Url::parse(page_url).map_err(|err| ReaderError::Parse(format!("{page_url}: {err}")))?;
    let document = Html::parse_document(html);

    let mut chapters = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = anchor.text().collect::<String>();
        let parsed = match profile.site {
            Site::DivineDaoLibrary => parse_divine_entry(href),
            _ => parse_titled_entry(href, anchor.value().attr("title"), &text),
        };
        let Some((number, title)) = parsed else {
            tracing::debug!(href, "skip listing entry without chapter number");
            continue;
        };
        let Ok(url) = base.join(href) else {
            tracing::debug!(href, "skip listing entry with invalid href");
            continue;
        };
        chapters.push(ChapterRef {
            number,
            title,
            source_locator: url.to_string(),
        });
    }

    chapters.sort_by_key(|chapter| chapter.number);
    Ok(chapters)
}

fn parse_divine_entry(href: &str) -> Option<(u32, String)> {
    let caps = DIVINE_HREF_RE.captures(href)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    let title = caps.get(2)?.as_str().to_owned();
    Some((number, title))
}

fn parse_titled_entry(href: &str, title_attr: Option<&str>, text: &str) -> Option<(u32, String)> {
    let number = CHAPTER_NUMBER_RE
        .captures(href)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let title = title_attr
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| text.trim());
    Some((number, title.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_of_rounds_up() {
        assert_eq!(page_of(1, 50), 1);
        assert_eq!(page_of(50, 50), 1);
        assert_eq!(page_of(51, 50), 2);
        assert_eq!(page_of(0, 50), 1);
    }

    #[test]
    fn divine_entries_take_number_and_title_from_href() -> anyhow::Result<()> {
        let profile = SiteProfile::for_site(Site::DivineDaoLibrary);
        let html = r#"<div class="collapseomatic_content"><ul>
<li><span><a href="https://www.divinedaolibrary.com/martial-peak/chapter-2-the-second-day/">2</a></span></li>
<li><span><a href="https://www.divinedaolibrary.com/martial-peak/chapter-1-first_steps">1</a></span></li>
<li><span><a href="https://www.divinedaolibrary.com/martial-peak/glossary">g</a></span></li>
</ul></div>"#;

        let chapters = parse_listing_page(
            html,
            "https://www.divinedaolibrary.com/martial-peak",
            &profile,
        )?;

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].title, "first_steps");
        assert_eq!(chapters[1].number, 2);
        assert_eq!(chapters[1].title, "the-second-day");
        assert_eq!(
            chapters[1].source_locator,
            "https://www.divinedaolibrary.com/martial-peak/chapter-2-the-second-day/"
        );
        Ok(())
    }

    #[test]
    fn novelfull_entries_resolve_relative_hrefs() -> anyhow::Result<()> {
        let profile = SiteProfile::for_site(Site::NovelFull);
        let html = r#"<div id="list-chapter"><ul class="list-chapter">
<li><a href="/martial-peak/chapter-101.html" title=" Chapter 101 - Rain "><span>Chapter 101</span></a></li>
<li><a href="/martial-peak/chapter-100.html"><span>Chapter 100 - Dusk</span></a></li>
<li><a href="/martial-peak/extra.html" title="Extra">Extra</a></li>
</ul></div>"#;

        let chapters = parse_listing_page(
            html,
            "https://novelfull.com/martial-peak.html?page=3",
            &profile,
        )?;

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].number, 100);
        assert_eq!(chapters[0].title, "Chapter 100 - Dusk");
        assert_eq!(chapters[1].title, "Chapter 101 - Rain");
        assert_eq!(
            chapters[1].source_locator,
            "https://novelfull.com/martial-peak/chapter-101.html"
        );
        Ok(())
    }
}
