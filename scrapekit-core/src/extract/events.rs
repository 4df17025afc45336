use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStop {
    MaxPages,
    ControlMissing,
    Failed(String),
}

/// Something the engine wants reported while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExtractionEvent {
    Navigating {
        url: String,
    },
    StrategySelected {
        strategy: String,
    },
    FieldFailed {
        field: String,
        selector: String,
        error: String,
    },
    ItemFieldFailed {
        item: usize,
        field: String,
        selector: String,
        error: String,
    },
    PageExtracted {
        page: u32,
    },
    PaginationStopped {
        page: u32,
        reason: PaginationStop,
    },
    ScrollCompleted {
        scroll: u32,
        total: u32,
    },
    ScrollStopped {
        scroll: u32,
        error: String,
    },
    ItemsFound {
        count: usize,
    },
    ExtractionFailed {
        kind: String,
        error: String,
    },
}

impl ExtractionEvent {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ExtractionEvent::FieldFailed { .. }
                | ExtractionEvent::ItemFieldFailed { .. }
                | ExtractionEvent::ScrollStopped { .. }
                | ExtractionEvent::PaginationStopped {
                    reason: PaginationStop::Failed(_),
                    ..
                }
        )
    }
}

/// Sink the engine writes its progress, warnings and failures to.
pub trait ExtractionObserver: Send + Sync {
    fn on_event(&self, event: &ExtractionEvent);
}

/// Default observer: forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExtractionObserver for TracingObserver {
    fn on_event(&self, event: &ExtractionEvent) {
        match event {
            ExtractionEvent::Navigating { url } => info!(%url, "navigating"),
            ExtractionEvent::StrategySelected { strategy } => {
                info!(%strategy, "extraction strategy selected")
            }
            ExtractionEvent::FieldFailed {
                field,
                selector,
                error,
            } => warn!(%field, %selector, %error, "failed to extract field"),
            ExtractionEvent::ItemFieldFailed {
                item,
                field,
                selector,
                error,
            } => warn!(item, %field, %selector, %error, "failed to extract item field"),
            ExtractionEvent::PageExtracted { page } => debug!(page, "page extracted"),
            ExtractionEvent::PaginationStopped { page, reason } => match reason {
                PaginationStop::Failed(error) => {
                    warn!(page, %error, "failed to navigate to page; pagination stopped")
                }
                PaginationStop::ControlMissing => {
                    info!(page, "pagination control absent; pagination finished")
                }
                PaginationStop::MaxPages => info!(page, "max pages reached"),
            },
            ExtractionEvent::ScrollCompleted { scroll, total } => {
                info!(scroll, total, "scroll completed")
            }
            ExtractionEvent::ScrollStopped { scroll, error } => {
                warn!(scroll, %error, "scroll failed; infinite scroll stopped")
            }
            ExtractionEvent::ItemsFound { count } => info!(count, "items found"),
            ExtractionEvent::ExtractionFailed { kind, error } => {
                error!(%kind, %error, "extraction failed")
            }
        }
    }
}
