use async_trait::async_trait;
use indexmap::IndexMap;

use crate::config::{ExtractionConfig, LoginSection};

use super::engine::Engine;
use super::error::{ExtractError, ExtractResult};
use super::record::ExtractionResult;
use super::strategy::{CustomExtractor, CustomFunction};

pub const LOGIN: &str = "login";
pub const INFINITE_SCROLL: &str = "infinite_scroll";
pub const ITEM_LIST: &str = "item_list";

/// Logs in with the `login` section, then runs the standard extraction.
///
/// Without credentials the login form is left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginExtractor;

#[async_trait(?Send)]
impl CustomExtractor for LoginExtractor {
    fn name(&self) -> &str {
        LOGIN
    }

    fn validate(&self, config: &ExtractionConfig) -> ExtractResult<()> {
        config.validate()?;
        if let Some(login) = config.login.as_ref().filter(|login| login.has_credentials()) {
            required(&login.username_selector, LOGIN, "username_selector")?;
            required(&login.password_selector, LOGIN, "password_selector")?;
            required(&login.submit_selector, LOGIN, "submit_selector")?;
        }
        Ok(())
    }

    async fn extract(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        engine.navigate_and_settle(&config.url, 0).await?;

        if let Some(login) = config.login.as_ref().filter(|login| login.has_credentials()) {
            submit_login(engine, login).await?;
        }

        engine.extract_standard(config).await
    }
}

async fn submit_login(engine: &mut Engine<'_>, login: &LoginSection) -> ExtractResult<()> {
    let username_selector = required(&login.username_selector, LOGIN, "username_selector")?;
    let password_selector = required(&login.password_selector, LOGIN, "password_selector")?;
    let submit_selector = required(&login.submit_selector, LOGIN, "submit_selector")?;
    let username = login.username.as_deref().unwrap_or_default();
    let password = login.password.as_deref().unwrap_or_default();

    let driver = engine.driver();
    driver.fill(username_selector, username).await?;
    driver.fill(password_selector, password).await?;
    driver.click(submit_selector).await?;
    driver.wait_millis(login.settle_millis).await?;
    Ok(())
}

fn required<'a>(
    selector: &'a Option<String>,
    owner: &str,
    key: &str,
) -> ExtractResult<&'a str> {
    selector
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ExtractError::Configuration(format!("{owner} requires {key}")))
}

/// Scroll-then-collect extraction over repeated item elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemListExtractor;

#[async_trait(?Send)]
impl CustomExtractor for ItemListExtractor {
    fn name(&self) -> &str {
        INFINITE_SCROLL
    }

    fn validate(&self, config: &ExtractionConfig) -> ExtractResult<()> {
        if config.url.trim().is_empty() {
            return Err(ExtractError::Configuration("url must not be empty".into()));
        }
        required(&config.item_selector, INFINITE_SCROLL, "item_selector").map(|_| ())
    }

    async fn extract(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        engine.extract_item_list(config).await
    }
}

/// Named custom extractors selectable from configuration files.
#[derive(Debug, Clone, Default)]
pub struct CustomRegistry {
    entries: IndexMap<String, CustomFunction>,
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(LOGIN, CustomFunction::new(LoginExtractor));
        let item_list = CustomFunction::new(ItemListExtractor);
        registry.register(INFINITE_SCROLL, item_list.clone());
        registry.register(ITEM_LIST, item_list);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: CustomFunction) {
        self.entries.insert(name.into().to_ascii_lowercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<&CustomFunction> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Attaches the extractor named by `custom_function`, if any.
    pub fn resolve(&self, mut config: ExtractionConfig) -> ExtractResult<ExtractionConfig> {
        if config.custom.is_some() {
            return Ok(config);
        }
        let Some(name) = config.custom_function.as_deref() else {
            return Ok(config);
        };
        let function = self.get(name).cloned().ok_or_else(|| {
            let known = self.names().collect::<Vec<_>>().join(", ");
            ExtractError::Configuration(format!(
                "unknown custom function `{name}` (available: {known})"
            ))
        })?;
        config.custom = Some(function);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_by_name() {
        let registry = CustomRegistry::with_builtins();
        let mut config = ExtractionConfig::new("https://example.com");
        config.custom_function = Some("Infinite_Scroll".into());
        let resolved = registry.resolve(config).unwrap();
        assert_eq!(
            resolved.custom.as_ref().map(|custom| custom.name()),
            Some(INFINITE_SCROLL)
        );
    }

    #[test]
    fn unknown_name_lists_available_functions() {
        let registry = CustomRegistry::with_builtins();
        let mut config = ExtractionConfig::new("https://example.com");
        config.custom_function = Some("scrape_everything".into());
        let err = registry.resolve(config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("scrape_everything"));
        assert!(message.contains(LOGIN));
    }

    #[test]
    fn missing_login_selector_is_reported() {
        let config = ExtractionConfig::new("https://example.com")
            .with_selector("title", "h1")
            .with_login(LoginSection {
                username: Some("demo".into()),
                password: Some("demo".into()),
                ..LoginSection::default()
            });
        let err = LoginExtractor.validate(&config).unwrap_err();
        assert!(err.to_string().contains("login requires username_selector"));
    }

    #[test]
    fn item_list_requires_item_selector() {
        let config = ExtractionConfig::new("https://example.com").with_item_field("quote", "span");
        let err = ItemListExtractor.validate(&config).unwrap_err();
        assert!(err.to_string().contains("infinite_scroll requires item_selector"));

        let config = config.with_item_selector("div.quote");
        assert!(ItemListExtractor.validate(&config).is_ok());
    }
}
