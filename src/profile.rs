use serde::{Deserialize, Serialize};

use crate::router::NamePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[value(name = "divinedaolibrary")]
    DivineDaoLibrary,
    #[value(name = "novelfull")]
    NovelFull,
    #[value(name = "moboreader")]
    MoboReader,
}

/// Noise removal applied to a located content subtree, in this order:
/// scripts, ad containers, everything after a horizontal rule, `ins`
/// inserts, the leading paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseRules {
    pub ad_selectors: Vec<String>,
    pub strip_after_rule: bool,
    pub drop_leading_paragraph: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStrategy {
    /// Every chapter is linked from one index page.
    IndexPage { entry_selector: String },
    /// The index is split over numbered pages of `per_page` chapters.
    Paginated {
        entry_selector: String,
        per_page: u32,
    },
    /// Book detail and chapter list come from a JSON API.
    ChapterApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingStyle {
    None,
    FromFileName,
    NovelAndChapter,
}

/// Whether a chapter body came back complete or as a truncated preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Full,
    Short,
}

impl Completeness {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "(full)",
            Self::Short => "(short)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub site: Site,
    pub base_url: String,
    pub listing: ListingStrategy,
    pub content_selector: String,
    pub noise: NoiseRules,
    pub name_policy: NamePolicy,
    pub heading: HeadingStyle,
    pub keep_raw: bool,
}

/// Minimum characters of the wrapped first part for a full chapter body.
pub const FULL_CHAPTER_THRESHOLD: usize = 2500;

const KNOWN_BOOKS: &[(&str, &str)] = &[
    ("Apotheosis", "18325322"),
    ("The Demon King's Destiny", "23998322"),
];

pub fn known_book_id(novel: &str) -> Option<&'static str> {
    KNOWN_BOOKS
        .iter()
        .find(|(name, _)| *name == novel)
        .map(|(_, id)| *id)
}

fn selectors(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

impl SiteProfile {
    pub fn for_site(site: Site) -> Self {
        match site {
            Site::DivineDaoLibrary => Self {
                site,
                base_url: "https://www.divinedaolibrary.com".to_owned(),
                listing: ListingStrategy::IndexPage {
                    entry_selector: ".collapseomatic_content li > span > a".to_owned(),
                },
                content_selector: "main > article .entry-content".to_owned(),
                noise: NoiseRules {
                    ad_selectors: selectors(&[
                        ".ezoic-adpicker-ad",
                        ".ezoic-ad",
                        ".banner-1",
                        ".banner-1117",
                        ".adtester-container",
                        ".adtester-container-117",
                    ]),
                    strip_after_rule: true,
                    drop_leading_paragraph: true,
                },
                name_policy: NamePolicy::Delete,
                heading: HeadingStyle::FromFileName,
                keep_raw: true,
            },
            Site::NovelFull => Self {
                site,
                base_url: "https://novelfull.com".to_owned(),
                listing: ListingStrategy::Paginated {
                    entry_selector: "#list-chapter a".to_owned(),
                    per_page: 50,
                },
                content_selector: "#chapter-content".to_owned(),
                noise: NoiseRules {
                    ad_selectors: selectors(&[".google-auto-placed", ".ads", ".ads-holder"]),
                    strip_after_rule: false,
                    drop_leading_paragraph: false,
                },
                name_policy: NamePolicy::Delete,
                heading: HeadingStyle::None,
                keep_raw: true,
            },
            Site::MoboReader => Self {
                site,
                base_url: "https://overseas-en.cdreader.com/api".to_owned(),
                listing: ListingStrategy::ChapterApi,
                content_selector: "body > div".to_owned(),
                noise: NoiseRules {
                    ad_selectors: Vec::new(),
                    strip_after_rule: false,
                    drop_leading_paragraph: false,
                },
                name_policy: NamePolicy::Space,
                heading: HeadingStyle::NovelAndChapter,
                keep_raw: false,
            },
        }
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.trim_end_matches('/').to_owned();
        }
        self
    }

    pub fn listing_url(&self, novel: &str, page: Option<u32>) -> String {
        match (&self.listing, page) {
            (ListingStrategy::Paginated { .. }, Some(page)) => {
                format!("{}/{novel}.html?page={page}", self.base_url)
            }
            _ => format!("{}/{novel}", self.base_url),
        }
    }
}
