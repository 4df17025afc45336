use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::error::DriverResult;

pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Opaque reference to an element resolved by a [`PageDriver`].
///
/// Handles are only meaningful to the driver that produced them, and only
/// until its next successful `navigate`, `click` or `click_element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

impl ElementHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// How long `navigate` blocks before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Return once the load event fired.
    Load,
    /// Return once the document is complete and the network went quiet.
    #[default]
    NetworkIdle,
}

/// Narrow page capability the extraction engine drives.
///
/// Every call is a suspension point; the engine never issues two calls
/// concurrently against the same driver.
#[async_trait(?Send)]
pub trait PageDriver {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> DriverResult<()>;
    async fn wait_millis(&mut self, millis: u64) -> DriverResult<()>;
    async fn query_all(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>>;
    async fn query(&mut self, selector: &str) -> DriverResult<Option<ElementHandle>>;
    /// Element-scoped variant of [`PageDriver::query_all`].
    async fn query_all_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Vec<ElementHandle>>;
    /// Element-scoped variant of [`PageDriver::query`].
    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Option<ElementHandle>>;
    async fn evaluate_script(&mut self, script: &str) -> DriverResult<Value>;
    async fn screenshot(&mut self, path: &Path) -> DriverResult<()>;
    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()>;
    async fn click(&mut self, selector: &str) -> DriverResult<()>;
    async fn click_element(&mut self, element: ElementHandle) -> DriverResult<()>;
    async fn element_text_content(&mut self, element: ElementHandle)
        -> DriverResult<Option<String>>;
    async fn element_attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>>;
}
