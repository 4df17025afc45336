pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod scraper;
pub mod testing;

pub use browser::{
    ChromiumDriver, DriverError, DriverResult, ElementHandle, PageDriver, SessionManager,
    WaitPolicy,
};
pub use config::{
    load_scrape_config, ExtractionConfig, LoginSection, ScrapeConfig, SelectorExpr, SessionConfig,
};
pub use error::{ConfigError, Result};
pub use extract::{
    CustomExtractor, CustomFunction, CustomRegistry, Engine, ExtractError, ExtractResult,
    ExtractionEvent, ExtractionMetrics, ExtractionObserver, ExtractionResult, ExtractionStrategy,
    FieldValue, Record, TracingObserver,
};
pub use output::{format_requested, format_result, FormattedResult, OutputFormat, Table};
pub use scraper::{RunReport, Scraper};
