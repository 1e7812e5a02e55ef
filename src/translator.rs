use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ReaderError, Result};
use crate::fetch::Fetcher;

pub const DEFAULT_TRANSLATOR_URL: &str = "https://microsoft-translator-text.p.rapidapi.com";
pub const URL_ENV: &str = "NOVELREADER_TRANSLATOR_URL";
pub const KEY_ENV: &str = "NOVELREADER_TRANSLATOR_KEY";
pub const HOST_ENV: &str = "NOVELREADER_TRANSLATOR_HOST";

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub from: String,
    pub to: String,
}

impl TranslatorConfig {
    pub fn new(base_url: &str, from: &str, to: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: None,
            api_host: None,
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }

    /// Service location and credentials from the environment. The host
    /// header defaults to the host of the service URL.
    pub fn from_env(from: &str, to: &str) -> anyhow::Result<Self> {
        let base_url = std::env::var(URL_ENV).unwrap_or_else(|_| DEFAULT_TRANSLATOR_URL.to_owned());
        let parsed = url::Url::parse(&base_url)
            .map_err(|err| anyhow::anyhow!("invalid {URL_ENV} `{base_url}`: {err}"))?;
        let mut config = Self::new(&base_url, from, to);
        config.api_key = std::env::var(KEY_ENV).ok().filter(|key| !key.is_empty());
        config.api_host = std::env::var(HOST_ENV)
            .ok()
            .filter(|host| !host.is_empty())
            .or_else(|| parsed.host_str().map(str::to_owned));
        if config.api_key.is_none() {
            tracing::warn!("{KEY_ENV} is not set; requests are sent without an api key");
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TranslationEntry {
    #[serde(default)]
    translations: Vec<TranslationItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationItem {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    display_target: Option<String>,
}

fn decode(payload: &Value) -> Option<Vec<TranslationEntry>> {
    serde_json::from_value(payload.clone()).ok()
}

/// First translation of the first entry of a service payload.
pub fn first_translation(payload: &Value) -> Option<String> {
    decode(payload)?
        .into_iter()
        .next()?
        .translations
        .into_iter()
        .find_map(|item| item.text.or(item.display_target))
}

/// Whether the first entry of a payload carries any translation.
pub fn has_translations(payload: &Value) -> bool {
    decode(payload)
        .and_then(|entries| entries.into_iter().next())
        .is_some_and(|entry| !entry.translations.is_empty())
}

/// Dictionary and text translation over HTTP.
#[derive(Debug, Clone)]
pub struct Translator {
    fetcher: Fetcher,
    config: TranslatorConfig,
}

impl Translator {
    pub fn new(fetcher: Fetcher, config: TranslatorConfig) -> Self {
        Self { fetcher, config }
    }

    /// Dictionary entry for one word, returned verbatim.
    pub fn lookup_word(&self, word: &str) -> Result<Value> {
        let url = format!(
            "{}/Dictionary/Lookup?to={}&api-version=3.0&from={}",
            self.config.base_url, self.config.to, self.config.from
        );
        self.post(&url, word)
    }

    pub fn translate_text(&self, text: &str) -> Result<Value> {
        let url = format!(
            "{}/translate?to={}&api-version=3.0&from={}&profanityAction=NoAction&textType=plain",
            self.config.base_url, self.config.to, self.config.from
        );
        self.post(&url, text)
    }

    fn post(&self, url: &str, text: &str) -> Result<Value> {
        let mut headers = Vec::new();
        if let Some(key) = &self.config.api_key {
            headers.push(("x-rapidapi-key", key.as_str()));
        }
        if let Some(host) = &self.config.api_host {
            headers.push(("x-rapidapi-host", host.as_str()));
        }
        let payload: Value =
            self.fetcher
                .post_json_with_headers(url, &json!([{ "Text": text }]), &headers)?;
        if decode(&payload).is_none() {
            return Err(ReaderError::fetch(url, "malformed translation payload"));
        }
        Ok(payload)
    }
}
