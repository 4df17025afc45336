use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::extract::{CustomFunction, ExtractError, ExtractResult};
use crate::output::OutputFormat;

/// Selector expression handed verbatim to the page driver.
pub type SelectorExpr = String;

pub const DEFAULT_WAIT_MILLIS: u64 = 2000;
pub const DEFAULT_MAX_PAGES: u32 = 5;
pub const DEFAULT_PAGE_SETTLE_MILLIS: u64 = 2000;
pub const DEFAULT_MAX_SCROLLS: u32 = 10;
pub const DEFAULT_SCROLL_DELAY_MILLIS: u64 = 2000;
pub const DEFAULT_LOGIN_SETTLE_MILLIS: u64 = 3000;
pub const DEFAULT_SLOW_MO_MILLIS: u64 = 100;

/// One run file: the extraction itself plus the browser session it runs in.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    #[serde(flatten)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub browser: SessionConfig,
}

/// Immutable description of a single extraction run.
///
/// `selectors` and `item_selectors` keep their declaration order, which is
/// also the field order of every produced record.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub url: String,
    #[serde(default)]
    pub selectors: IndexMap<String, SelectorExpr>,
    #[serde(default = "default_wait_millis", alias = "wait_time")]
    pub wait_millis: u64,
    #[serde(default)]
    pub multi_page: bool,
    #[serde(default)]
    pub pagination_selector: Option<SelectorExpr>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_page_settle_millis")]
    pub page_settle_millis: u64,
    #[serde(default)]
    pub infinite_scroll: bool,
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,
    #[serde(default = "default_scroll_delay_millis", alias = "scroll_delay")]
    pub scroll_delay_millis: u64,
    #[serde(default)]
    pub item_selector: Option<SelectorExpr>,
    #[serde(default)]
    pub item_selectors: Option<IndexMap<String, SelectorExpr>>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Name of a registered custom extractor, resolved into `custom`.
    #[serde(default)]
    pub custom_function: Option<String>,
    #[serde(default)]
    pub login: Option<LoginSection>,
    #[serde(skip)]
    pub custom: Option<CustomFunction>,
}

impl ExtractionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selectors: IndexMap::new(),
            wait_millis: DEFAULT_WAIT_MILLIS,
            multi_page: false,
            pagination_selector: None,
            max_pages: DEFAULT_MAX_PAGES,
            page_settle_millis: DEFAULT_PAGE_SETTLE_MILLIS,
            infinite_scroll: false,
            max_scrolls: DEFAULT_MAX_SCROLLS,
            scroll_delay_millis: DEFAULT_SCROLL_DELAY_MILLIS,
            item_selector: None,
            item_selectors: None,
            output_format: default_output_format(),
            custom_function: None,
            login: None,
            custom: None,
        }
    }

    pub fn with_selector(mut self, field: impl Into<String>, selector: impl Into<String>) -> Self {
        self.selectors.insert(field.into(), selector.into());
        self
    }

    pub fn with_wait_millis(mut self, millis: u64) -> Self {
        self.wait_millis = millis;
        self
    }

    pub fn with_pagination(mut self, selector: impl Into<String>, max_pages: u32) -> Self {
        self.multi_page = true;
        self.pagination_selector = Some(selector.into());
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_settle_millis(mut self, millis: u64) -> Self {
        self.page_settle_millis = millis;
        self
    }

    pub fn with_infinite_scroll(mut self, max_scrolls: u32, delay_millis: u64) -> Self {
        self.infinite_scroll = true;
        self.max_scrolls = max_scrolls;
        self.scroll_delay_millis = delay_millis;
        self
    }

    pub fn with_item_selector(mut self, selector: impl Into<String>) -> Self {
        self.item_selector = Some(selector.into());
        self
    }

    pub fn with_item_field(mut self, field: impl Into<String>, selector: impl Into<String>) -> Self {
        self.item_selectors
            .get_or_insert_with(IndexMap::new)
            .insert(field.into(), selector.into());
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn with_login(mut self, login: LoginSection) -> Self {
        self.login = Some(login);
        self
    }

    pub fn with_custom(mut self, custom: CustomFunction) -> Self {
        self.custom_function = Some(custom.name().to_string());
        self.custom = Some(custom);
        self
    }

    /// True when the run is shaped as a list of items rather than one set of fields.
    pub fn is_item_list(&self) -> bool {
        self.item_selectors
            .as_ref()
            .is_some_and(|fields| !fields.is_empty())
    }

    pub fn requested_format(&self) -> ExtractResult<OutputFormat> {
        self.output_format.parse()
    }

    /// Checks the invariants that must hold before any navigation happens.
    pub fn validate(&self) -> ExtractResult<()> {
        if self.url.trim().is_empty() {
            return Err(ExtractError::Configuration("url must not be empty".into()));
        }
        if self.multi_page && !has_selector(self.pagination_selector.as_deref()) {
            return Err(ExtractError::Configuration(
                "multi_page requires pagination_selector".into(),
            ));
        }
        if self.max_pages < 1 {
            return Err(ExtractError::Configuration(
                "max_pages must be at least 1".into(),
            ));
        }
        if self.is_item_list() && !has_selector(self.item_selector.as_deref()) {
            return Err(ExtractError::Configuration(
                "item_selectors require item_selector".into(),
            ));
        }
        self.requested_format()?;
        Ok(())
    }
}

fn has_selector(selector: Option<&str>) -> bool {
    selector.is_some_and(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginSection {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub username_selector: Option<SelectorExpr>,
    #[serde(default)]
    pub password_selector: Option<SelectorExpr>,
    #[serde(default)]
    pub submit_selector: Option<SelectorExpr>,
    #[serde(default = "default_login_settle_millis")]
    pub settle_millis: u64,
}

impl Default for LoginSection {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            username_selector: None,
            password_selector: None,
            submit_selector: None,
            settle_millis: DEFAULT_LOGIN_SETTLE_MILLIS,
        }
    }
}

impl LoginSection {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Chromium launch options for one browser session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_slow_mo_millis", alias = "slow_mo")]
    pub slow_mo_millis: u64,
    #[serde(default)]
    pub executable_path: Option<String>,
    #[serde(default = "default_true")]
    pub sandbox: bool,
    #[serde(default)]
    pub disable_gpu: bool,
    #[serde(default = "default_window_size")]
    pub window_size: [u32; 2],
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            slow_mo_millis: DEFAULT_SLOW_MO_MILLIS,
            executable_path: None,
            sandbox: true,
            disable_gpu: false,
            window_size: default_window_size(),
            user_agent: None,
            request_timeout_seconds: None,
        }
    }
}

fn default_wait_millis() -> u64 {
    DEFAULT_WAIT_MILLIS
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_page_settle_millis() -> u64 {
    DEFAULT_PAGE_SETTLE_MILLIS
}

fn default_max_scrolls() -> u32 {
    DEFAULT_MAX_SCROLLS
}

fn default_scroll_delay_millis() -> u64 {
    DEFAULT_SCROLL_DELAY_MILLIS
}

fn default_login_settle_millis() -> u64 {
    DEFAULT_LOGIN_SETTLE_MILLIS
}

fn default_slow_mo_millis() -> u64 {
    DEFAULT_SLOW_MO_MILLIS
}

fn default_output_format() -> String {
    "json".to_string()
}

fn default_window_size() -> [u32; 2] {
    [1366, 768]
}

fn default_true() -> bool {
    true
}

const TOP_LEVEL_KEYS: &[&str] = &[
    "url",
    "selectors",
    "wait_millis",
    "wait_time",
    "multi_page",
    "pagination_selector",
    "max_pages",
    "page_settle_millis",
    "infinite_scroll",
    "max_scrolls",
    "scroll_delay_millis",
    "scroll_delay",
    "item_selector",
    "item_selectors",
    "output_format",
    "custom_function",
    "login",
    "browser",
];

const LOGIN_KEYS: &[&str] = &[
    "username",
    "password",
    "username_selector",
    "password_selector",
    "submit_selector",
    "settle_millis",
];

const BROWSER_KEYS: &[&str] = &[
    "headless",
    "slow_mo_millis",
    "slow_mo",
    "executable_path",
    "sandbox",
    "disable_gpu",
    "window_size",
    "user_agent",
    "request_timeout_seconds",
];

#[derive(Clone, Copy)]
enum Syntax {
    Toml,
    Yaml,
}

/// Loads a run file, choosing the parser from the file extension.
///
/// Keys no field reads are logged and otherwise ignored.
pub fn load_scrape_config<P: AsRef<Path>>(path: P) -> Result<ScrapeConfig> {
    let path = path.as_ref();
    let syntax = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("toml") => Syntax::Toml,
        Some("yaml") | Some("yml") => Syntax::Yaml,
        _ => {
            return Err(ConfigError::UnsupportedExtension {
                path: path.to_path_buf(),
            })
        }
    };
    let content = read_config(path)?;
    let config = parse(syntax, path, &content)?;
    if let Ok(document) = parse::<Value>(syntax, path, &content) {
        for key in unknown_keys(&document) {
            warn!(path = %path.display(), key = %key, "unknown configuration key ignored");
        }
    }
    Ok(config)
}

/// Dotted paths of keys in a run file that no configuration field reads.
pub fn unknown_keys(document: &Value) -> Vec<String> {
    let mut unknown = Vec::new();
    collect_unknown(document, None, TOP_LEVEL_KEYS, &mut unknown);
    for (section, known) in [("login", LOGIN_KEYS), ("browser", BROWSER_KEYS)] {
        if let Some(value) = document.get(section) {
            collect_unknown(value, Some(section), known, &mut unknown);
        }
    }
    unknown
}

fn collect_unknown(value: &Value, section: Option<&str>, known: &[&str], out: &mut Vec<String>) {
    let Some(map) = value.as_object() else {
        return;
    };
    for key in map.keys().filter(|key| !known.contains(&key.as_str())) {
        out.push(match section {
            Some(section) => format!("{section}.{key}"),
            None => key.clone(),
        });
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })
}

fn parse<T>(syntax: Syntax, path: &Path, content: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    match syntax {
        Syntax::Toml => toml::from_str(content).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        }),
        Syntax::Yaml => serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            source,
            path: path.to_path_buf(),
        }),
    }
}
