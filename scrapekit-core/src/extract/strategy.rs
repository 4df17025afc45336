use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ExtractionConfig;

use super::engine::Engine;
use super::error::{ExtractError, ExtractResult};
use super::record::ExtractionResult;

/// Caller-supplied extraction algorithm that takes over a whole run.
///
/// The engine hands over control entirely and does not inspect the result
/// beyond passing it to the output formatter.
#[async_trait(?Send)]
pub trait CustomExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Checks the configuration before anything touches the page.
    fn validate(&self, _config: &ExtractionConfig) -> ExtractResult<()> {
        Ok(())
    }

    async fn extract(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult>;
}

/// Shareable handle to a [`CustomExtractor`], stored in the configuration.
#[derive(Clone)]
pub struct CustomFunction(Arc<dyn CustomExtractor>);

impl CustomFunction {
    pub fn new<E>(extractor: E) -> Self
    where
        E: CustomExtractor + 'static,
    {
        Self(Arc::new(extractor))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn validate(&self, config: &ExtractionConfig) -> ExtractResult<()> {
        self.0.validate(config)
    }

    pub async fn call(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        self.0.extract(engine, config).await
    }
}

impl From<Arc<dyn CustomExtractor>> for CustomFunction {
    fn from(extractor: Arc<dyn CustomExtractor>) -> Self {
        Self(extractor)
    }
}

impl fmt::Debug for CustomFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomFunction").field(&self.name()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    Standard,
    Pagination,
    ItemList,
    Custom(CustomFunction),
}

impl ExtractionStrategy {
    /// Picks the strategy for `config`, rejecting invalid configurations
    /// before anything touches the page.
    pub fn select(config: &ExtractionConfig) -> ExtractResult<Self> {
        if let Some(custom) = &config.custom {
            config.requested_format()?;
            custom.validate(config)?;
            return Ok(ExtractionStrategy::Custom(custom.clone()));
        }
        if let Some(name) = &config.custom_function {
            return Err(ExtractError::Configuration(format!(
                "custom function `{name}` is not registered"
            )));
        }
        config.validate()?;
        if config.is_item_list() {
            Ok(ExtractionStrategy::ItemList)
        } else if config.multi_page {
            Ok(ExtractionStrategy::Pagination)
        } else {
            Ok(ExtractionStrategy::Standard)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExtractionStrategy::Standard => "standard",
            ExtractionStrategy::Pagination => "pagination",
            ExtractionStrategy::ItemList => "item_list",
            ExtractionStrategy::Custom(custom) => custom.name(),
        }
    }

    pub async fn run(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        match self {
            ExtractionStrategy::Standard => engine.extract_standard(config).await,
            ExtractionStrategy::Pagination => {
                let seed = engine.extract_first_page(config).await?;
                engine.paginate(config, seed).await
            }
            ExtractionStrategy::ItemList => engine.extract_item_list(config).await,
            ExtractionStrategy::Custom(custom) => custom.call(engine, config).await,
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
