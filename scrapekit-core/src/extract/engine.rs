use std::sync::Arc;

use indexmap::IndexMap;

use crate::browser::{DriverResult, ElementHandle, PageDriver, WaitPolicy, SCROLL_TO_BOTTOM_SCRIPT};
use crate::config::{ExtractionConfig, SelectorExpr};
use crate::output::{format_result, FormattedResult};

use super::error::{ExtractError, ExtractResult};
use super::events::{ExtractionEvent, ExtractionObserver, PaginationStop, TracingObserver};
use super::metrics::ExtractionMetrics;
use super::record::{ExtractionResult, FieldValue, Record};
use super::strategy::ExtractionStrategy;

/// Drives one extraction run against a borrowed page driver.
///
/// The engine holds no state shared between runs; the driver is exclusively
/// borrowed for the engine's lifetime.
pub struct Engine<'d> {
    driver: &'d mut dyn PageDriver,
    observer: Arc<dyn ExtractionObserver>,
    metrics: ExtractionMetrics,
}

impl<'d> Engine<'d> {
    pub fn new(driver: &'d mut dyn PageDriver) -> Self {
        Self::with_observer(driver, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        driver: &'d mut dyn PageDriver,
        observer: Arc<dyn ExtractionObserver>,
    ) -> Self {
        Self {
            driver,
            observer,
            metrics: ExtractionMetrics::default(),
        }
    }

    /// Direct access to the page, for custom extractors.
    pub fn driver(&mut self) -> &mut (dyn PageDriver + 'd) {
        &mut *self.driver
    }

    pub fn metrics(&self) -> &ExtractionMetrics {
        &self.metrics
    }

    pub fn emit(&self, event: ExtractionEvent) {
        self.observer.on_event(&event);
    }

    /// Extracts and shapes the result according to `config.output_format`.
    pub async fn run(&mut self, config: &ExtractionConfig) -> ExtractResult<FormattedResult> {
        let result = self.extract(config).await?;
        format_result(result, config.requested_format()?)
    }

    /// Selects the strategy for `config` and runs it.
    ///
    /// Errors raised by a custom extractor are returned untouched.
    pub async fn extract(&mut self, config: &ExtractionConfig) -> ExtractResult<ExtractionResult> {
        let outcome = self.dispatch(config).await;
        if let Err(err) = &outcome {
            self.emit(ExtractionEvent::ExtractionFailed {
                kind: err.kind().to_string(),
                error: err.to_string(),
            });
        }
        outcome
    }

    async fn dispatch(&mut self, config: &ExtractionConfig) -> ExtractResult<ExtractionResult> {
        let strategy = ExtractionStrategy::select(config)?;
        self.emit(ExtractionEvent::StrategySelected {
            strategy: strategy.name().to_string(),
        });
        strategy.run(self, config).await
    }

    /// Navigates to `url`, waits for the network to go quiet, then waits `wait_millis`.
    pub async fn navigate_and_settle(&mut self, url: &str, wait_millis: u64) -> ExtractResult<()> {
        self.emit(ExtractionEvent::Navigating {
            url: url.to_string(),
        });
        self.driver.navigate(url, WaitPolicy::NetworkIdle).await?;
        self.driver.wait_millis(wait_millis).await?;
        Ok(())
    }

    pub async fn extract_standard(
        &mut self,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        let seed = self.extract_first_page(config).await?;
        if config.multi_page {
            return self.paginate(config, seed).await;
        }
        Ok(ExtractionResult::Single(seed))
    }

    pub(crate) async fn extract_first_page(
        &mut self,
        config: &ExtractionConfig,
    ) -> ExtractResult<Record> {
        self.navigate_and_settle(&config.url, config.wait_millis)
            .await?;
        if config.infinite_scroll {
            self.scroll_to_load(config.max_scrolls, config.scroll_delay_millis)
                .await;
        }
        let record = self.extract_fields(&config.selectors).await;
        self.metrics.record_page();
        self.emit(ExtractionEvent::PageExtracted { page: 1 });
        Ok(record)
    }

    /// Reads every configured field from the current document.
    ///
    /// A failing field is reported and left empty; the others are still read.
    pub async fn extract_fields(&mut self, selectors: &IndexMap<String, SelectorExpr>) -> Record {
        let mut record = Record::with_capacity(selectors.len());
        for (field, selector) in selectors {
            let value = match self.extract_field(selector).await {
                Ok(value) => {
                    self.metrics.record_field(true);
                    value
                }
                Err(err) => {
                    self.metrics.record_field(false);
                    self.emit(ExtractionEvent::FieldFailed {
                        field: field.clone(),
                        selector: selector.clone(),
                        error: err.to_string(),
                    });
                    FieldValue::empty()
                }
            };
            record.insert(field.clone(), value);
        }
        record
    }

    async fn extract_field(&mut self, selector: &str) -> DriverResult<FieldValue> {
        let elements = self.driver.query_all(selector).await?;
        match elements.as_slice() {
            [] => Ok(FieldValue::empty()),
            [single] => Ok(FieldValue::Text(self.trimmed_text(*single).await?)),
            many => {
                let mut values = Vec::with_capacity(many.len());
                for element in many {
                    let text = self.trimmed_text(*element).await?;
                    if !text.is_empty() {
                        values.push(text);
                    }
                }
                Ok(FieldValue::List(values))
            }
        }
    }

    async fn trimmed_text(&mut self, element: ElementHandle) -> DriverResult<String> {
        Ok(self
            .driver
            .element_text_content(element)
            .await?
            .map(|text| text.trim().to_string())
            .unwrap_or_default())
    }

    /// Follows the pagination control until it disappears, fails, or
    /// `max_pages` records have been collected. `seed` is always first.
    pub async fn paginate(
        &mut self,
        config: &ExtractionConfig,
        seed: Record,
    ) -> ExtractResult<ExtractionResult> {
        let selector = config
            .pagination_selector
            .as_deref()
            .filter(|selector| !selector.trim().is_empty())
            .ok_or_else(|| {
                ExtractError::Configuration("multi_page requires pagination_selector".into())
            })?;

        let mut records = vec![seed];
        let mut page = 2u32;
        loop {
            if page > config.max_pages {
                self.emit(ExtractionEvent::PaginationStopped {
                    page,
                    reason: PaginationStop::MaxPages,
                });
                break;
            }
            match self.advance_page(selector, config).await {
                Ok(Some(record)) => {
                    records.push(record);
                    self.metrics.record_page();
                    self.emit(ExtractionEvent::PageExtracted { page });
                    page += 1;
                }
                Ok(None) => {
                    self.emit(ExtractionEvent::PaginationStopped {
                        page,
                        reason: PaginationStop::ControlMissing,
                    });
                    break;
                }
                Err(err) => {
                    self.emit(ExtractionEvent::PaginationStopped {
                        page,
                        reason: PaginationStop::Failed(err.to_string()),
                    });
                    break;
                }
            }
        }
        Ok(ExtractionResult::Many(records))
    }

    async fn advance_page(
        &mut self,
        selector: &str,
        config: &ExtractionConfig,
    ) -> DriverResult<Option<Record>> {
        let Some(control) = self.driver.query(selector).await? else {
            return Ok(None);
        };
        self.driver.click_element(control).await?;
        self.driver.wait_millis(config.page_settle_millis).await?;
        Ok(Some(self.extract_fields(&config.selectors).await))
    }

    /// Scrolls to the bottom and waits, exactly `max_scrolls` times.
    ///
    /// There is no content-change detection; a failing step ends the loop early.
    pub async fn scroll_to_load(&mut self, max_scrolls: u32, scroll_delay_millis: u64) {
        for scroll in 1..=max_scrolls {
            match self.scroll_step(scroll_delay_millis).await {
                Ok(()) => {
                    self.metrics.record_scroll();
                    self.emit(ExtractionEvent::ScrollCompleted {
                        scroll,
                        total: max_scrolls,
                    });
                }
                Err(err) => {
                    self.emit(ExtractionEvent::ScrollStopped {
                        scroll,
                        error: err.to_string(),
                    });
                    break;
                }
            }
        }
    }

    async fn scroll_step(&mut self, delay_millis: u64) -> DriverResult<()> {
        self.driver.evaluate_script(SCROLL_TO_BOTTOM_SCRIPT).await?;
        self.driver.wait_millis(delay_millis).await
    }

    /// Loads the page, scrolls, then builds one record per `item_selector` match.
    pub async fn extract_item_list(
        &mut self,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        let item_selector = config
            .item_selector
            .as_deref()
            .filter(|selector| !selector.trim().is_empty())
            .ok_or_else(|| {
                ExtractError::Configuration("item list extraction requires item_selector".into())
            })?;
        let fields = config.item_selectors.clone().unwrap_or_default();

        self.navigate_and_settle(&config.url, 0).await?;
        self.scroll_to_load(config.max_scrolls, config.scroll_delay_millis)
            .await;

        let items = self.driver.query_all(item_selector).await?;
        self.emit(ExtractionEvent::ItemsFound { count: items.len() });

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            records.push(self.extract_item(index, item, &fields).await);
            self.metrics.record_item();
        }
        Ok(ExtractionResult::Many(records))
    }

    async fn extract_item(
        &mut self,
        index: usize,
        item: ElementHandle,
        fields: &IndexMap<String, SelectorExpr>,
    ) -> Record {
        let mut record = Record::with_capacity(fields.len());
        for (field, selector) in fields {
            let value = match self.item_field(item, selector).await {
                Ok(text) => {
                    self.metrics.record_field(true);
                    FieldValue::Text(text)
                }
                Err(err) => {
                    self.metrics.record_field(false);
                    self.emit(ExtractionEvent::ItemFieldFailed {
                        item: index,
                        field: field.clone(),
                        selector: selector.clone(),
                        error: err.to_string(),
                    });
                    FieldValue::empty()
                }
            };
            record.insert(field.clone(), value);
        }
        record
    }

    async fn item_field(&mut self, item: ElementHandle, selector: &str) -> DriverResult<String> {
        match self.driver.query_within(item, selector).await? {
            Some(element) => self.trimmed_text(element).await,
            None => Ok(String::new()),
        }
    }
}
