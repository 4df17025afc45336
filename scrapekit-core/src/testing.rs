//! In-memory page driver and event recorder for exercising the engine
//! without a browser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::browser::{DriverError, DriverResult, ElementHandle, PageDriver, WaitPolicy};
use crate::extract::{ExtractionEvent, ExtractionObserver};

#[derive(Debug, Clone, Default)]
pub struct ScriptedElement {
    text: Option<String>,
    attributes: HashMap<String, String>,
    children: IndexMap<String, Vec<ScriptedElement>>,
    failing: HashMap<String, String>,
}

impl ScriptedElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Element whose text content is absent (null).
    pub fn without_text() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, selector: impl Into<String>, child: ScriptedElement) -> Self {
        self.children.entry(selector.into()).or_default().push(child);
        self
    }

    pub fn with_failing_query(
        mut self,
        selector: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.failing.insert(selector.into(), message.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    elements: IndexMap<String, Vec<ScriptedElement>>,
    failing: HashMap<String, String>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: impl Into<String>, elements: Vec<ScriptedElement>) -> Self {
        self.elements
            .entry(selector.into())
            .or_default()
            .extend(elements);
        self
    }

    pub fn with_texts(self, selector: impl Into<String>, texts: &[&str]) -> Self {
        let elements = texts.iter().map(|text| ScriptedElement::text(*text)).collect();
        self.with(selector, elements)
    }

    pub fn with_failing_query(
        mut self,
        selector: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.failing.insert(selector.into(), message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate { url: String, wait: WaitPolicy },
    Wait(u64),
    QueryAll(String),
    Query(String),
    QueryAllWithin { scope: ElementHandle, selector: String },
    QueryWithin { scope: ElementHandle, selector: String },
    Evaluate(String),
    Screenshot(PathBuf),
    Fill { selector: String, text: String },
    Click(String),
    ClickElement(ElementHandle),
    TextContent(ElementHandle),
    Attribute { element: ElementHandle, name: String },
}

/// [`PageDriver`] that serves pre-scripted pages.
///
/// Navigation shows the first page; every element click moves to the next
/// one, staying on the last page once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    pages: Vec<ScriptedPage>,
    current: usize,
    arena: Vec<ScriptedElement>,
    calls: Vec<DriverCall>,
    navigation_error: Option<String>,
    click_error: Option<String>,
    script_failure: Option<(usize, String)>,
    scripts_run: usize,
}

impl ScriptedDriver {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn single(page: ScriptedPage) -> Self {
        Self::new(vec![page])
    }

    pub fn fail_navigation(mut self, message: impl Into<String>) -> Self {
        self.navigation_error = Some(message.into());
        self
    }

    pub fn fail_clicks(mut self, message: impl Into<String>) -> Self {
        self.click_error = Some(message.into());
        self
    }

    /// Lets `successful` scripts run, then fails every later evaluation.
    pub fn fail_scripts_after(mut self, successful: usize, message: impl Into<String>) -> Self {
        self.script_failure = Some((successful, message.into()));
        self
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn evaluated_scripts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Evaluate(script) => Some(script.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn waits(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Wait(millis) => Some(*millis),
                _ => None,
            })
            .collect()
    }

    fn page(&self) -> Option<&ScriptedPage> {
        self.pages.get(self.current)
    }

    fn element(&self, handle: ElementHandle) -> DriverResult<&ScriptedElement> {
        self.arena
            .get(handle.index())
            .ok_or(DriverError::StaleElement(handle.index()))
    }

    fn register(&mut self, elements: Vec<ScriptedElement>) -> Vec<ElementHandle> {
        let start = self.arena.len();
        let count = elements.len();
        self.arena.extend(elements);
        (start..start + count).map(ElementHandle::new).collect()
    }

    fn lookup(&self, selector: &str) -> DriverResult<Vec<ScriptedElement>> {
        let Some(page) = self.page() else {
            return Ok(Vec::new());
        };
        if let Some(message) = page.failing.get(selector) {
            return Err(DriverError::query(selector, message));
        }
        Ok(page.elements.get(selector).cloned().unwrap_or_default())
    }

    fn lookup_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Vec<ScriptedElement>> {
        let parent = self.element(scope)?;
        if let Some(message) = parent.failing.get(selector) {
            return Err(DriverError::query(selector, message));
        }
        Ok(parent.children.get(selector).cloned().unwrap_or_default())
    }
}

#[async_trait(?Send)]
impl PageDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> DriverResult<()> {
        self.calls.push(DriverCall::Navigate {
            url: url.to_string(),
            wait,
        });
        if let Some(message) = &self.navigation_error {
            return Err(DriverError::Navigation(format!("{url}: {message}")));
        }
        self.current = 0;
        self.arena.clear();
        Ok(())
    }

    async fn wait_millis(&mut self, millis: u64) -> DriverResult<()> {
        self.calls.push(DriverCall::Wait(millis));
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        self.calls.push(DriverCall::QueryAll(selector.to_string()));
        let found = self.lookup(selector)?;
        Ok(self.register(found))
    }

    async fn query(&mut self, selector: &str) -> DriverResult<Option<ElementHandle>> {
        self.calls.push(DriverCall::Query(selector.to_string()));
        let found = self.lookup(selector)?;
        Ok(self.register(found).into_iter().next())
    }

    async fn query_all_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Vec<ElementHandle>> {
        self.calls.push(DriverCall::QueryAllWithin {
            scope,
            selector: selector.to_string(),
        });
        let found = self.lookup_within(scope, selector)?;
        Ok(self.register(found))
    }

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Option<ElementHandle>> {
        self.calls.push(DriverCall::QueryWithin {
            scope,
            selector: selector.to_string(),
        });
        let found = self.lookup_within(scope, selector)?;
        Ok(self.register(found).into_iter().next())
    }

    async fn evaluate_script(&mut self, script: &str) -> DriverResult<Value> {
        self.calls.push(DriverCall::Evaluate(script.to_string()));
        if let Some((successful, message)) = &self.script_failure {
            if self.scripts_run >= *successful {
                return Err(DriverError::Script(message.clone()));
            }
        }
        self.scripts_run += 1;
        Ok(Value::Null)
    }

    async fn screenshot(&mut self, path: &Path) -> DriverResult<()> {
        self.calls.push(DriverCall::Screenshot(path.to_path_buf()));
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()> {
        self.calls.push(DriverCall::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.calls.push(DriverCall::Click(selector.to_string()));
        self.arena.clear();
        Ok(())
    }

    async fn click_element(&mut self, element: ElementHandle) -> DriverResult<()> {
        self.calls.push(DriverCall::ClickElement(element));
        self.element(element)?;
        if let Some(message) = &self.click_error {
            return Err(DriverError::Unexpected(message.clone()));
        }
        if self.current + 1 < self.pages.len() {
            self.current += 1;
        }
        self.arena.clear();
        Ok(())
    }

    async fn element_text_content(
        &mut self,
        element: ElementHandle,
    ) -> DriverResult<Option<String>> {
        self.calls.push(DriverCall::TextContent(element));
        Ok(self.element(element)?.text.clone())
    }

    async fn element_attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.calls.push(DriverCall::Attribute {
            element,
            name: name.to_string(),
        });
        Ok(self.element(element)?.attributes.get(name).cloned())
    }
}

/// Observer that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExtractionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExtractionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<ExtractionEvent> {
        self.events()
            .into_iter()
            .filter(ExtractionEvent::is_warning)
            .collect()
    }
}

impl ExtractionObserver for RecordingObserver {
    fn on_event(&self, event: &ExtractionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
