mod builtin;
mod engine;
mod error;
mod events;
mod metrics;
mod record;
mod strategy;

pub use builtin::{CustomRegistry, ItemListExtractor, LoginExtractor, INFINITE_SCROLL, ITEM_LIST, LOGIN};
pub use engine::Engine;
pub use error::{ExtractError, ExtractResult};
pub use events::{ExtractionEvent, ExtractionObserver, PaginationStop, TracingObserver};
pub use metrics::ExtractionMetrics;
pub use record::{ExtractionResult, FieldValue, Record, CELL_SEPARATOR};
pub use strategy::{CustomExtractor, CustomFunction, ExtractionStrategy};
