use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::browser::{ChromiumDriver, PageDriver, SessionManager};
use crate::config::{ExtractionConfig, SessionConfig};
use crate::extract::{
    CustomRegistry, Engine, ExtractError, ExtractResult, ExtractionMetrics, ExtractionObserver,
    ExtractionStrategy, TracingObserver,
};
use crate::output::FormattedResult;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub url: String,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: usize,
    pub metrics: ExtractionMetrics,
    pub screenshot: Option<PathBuf>,
    #[serde(skip)]
    pub output: FormattedResult,
}

/// Runs extractions end to end, each inside its own browser session.
pub struct Scraper {
    sessions: SessionManager,
    registry: CustomRegistry,
    observer: Arc<dyn ExtractionObserver>,
}

impl Scraper {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            sessions: SessionManager::new(session),
            registry: CustomRegistry::with_builtins(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_registry(mut self, registry: CustomRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExtractionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &CustomRegistry {
        &self.registry
    }

    /// Resolves and validates `config` without touching a browser.
    pub fn prepare(&self, config: ExtractionConfig) -> ExtractResult<(ExtractionConfig, ExtractionStrategy)> {
        let config = self.registry.resolve(config)?;
        let strategy = ExtractionStrategy::select(&config)?;
        Ok((config, strategy))
    }

    /// Extracts `config` in a fresh session; the browser is released on every path.
    ///
    /// With `screenshot` set, the final page is captured before release even
    /// when extraction failed.
    pub async fn run(
        &self,
        config: ExtractionConfig,
        screenshot: Option<PathBuf>,
    ) -> ExtractResult<RunReport> {
        let (config, strategy) = self.prepare(config)?;
        let started_at = Utc::now();
        let observer = Arc::clone(&self.observer);
        let url = config.url.clone();
        info!(%url, strategy = %strategy, "starting extraction run");

        let (output, metrics, screenshot) = self
            .sessions
            .with_driver::<_, ExtractError, _>(move |driver: &mut ChromiumDriver| {
                Box::pin(async move {
                    let (outcome, metrics) = {
                        let mut engine = Engine::with_observer(&mut *driver, observer);
                        let outcome = engine.run(&config).await;
                        (outcome, engine.metrics().clone())
                    };
                    let captured = match screenshot {
                        Some(path) => match driver.screenshot(&path).await {
                            Ok(()) => Some(path),
                            Err(err) => {
                                warn!(path = %path.display(), error = %err, "failed to capture screenshot");
                                None
                            }
                        },
                        None => None,
                    };
                    Ok((outcome?, metrics, captured))
                })
            })
            .await?;

        let report = RunReport {
            url,
            strategy: strategy.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            records: output.record_count(),
            metrics,
            screenshot,
            output,
        };
        info!(
            url = %report.url,
            records = report.records,
            field_failures = report.metrics.field_failures,
            "extraction run finished"
        );
        Ok(report)
    }
}
