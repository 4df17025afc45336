use std::sync::Arc;

use scrapekit_core::browser::SCROLL_TO_BOTTOM_SCRIPT;
use scrapekit_core::testing::{
    DriverCall, RecordingObserver, ScriptedDriver, ScriptedElement, ScriptedPage,
};
use scrapekit_core::{Engine, ExtractionConfig, ExtractionEvent, FieldValue, WaitPolicy};

fn quote(text: &str, author: &str) -> ScriptedElement {
    ScriptedElement::text("")
        .with_child("span.text", ScriptedElement::text(format!("  {text} ")))
        .with_child("small.author", ScriptedElement::text(author))
}

fn item_config() -> ExtractionConfig {
    ExtractionConfig::new("https://quotes.toscrape.com/scroll")
        .with_infinite_scroll(2, 500)
        .with_item_selector("div.quote")
        .with_item_field("quote", "span.text")
        .with_item_field("author", "small.author")
}

#[tokio::test]
async fn scrolls_exactly_max_scrolls_times() {
    let mut driver = ScriptedDriver::single(ScriptedPage::new());

    let scrolls = {
        let mut engine = Engine::new(&mut driver);
        engine.scroll_to_load(4, 100).await;
        engine.metrics().scrolls_performed
    };

    assert_eq!(scrolls, 4);
    assert_eq!(driver.evaluated_scripts(), vec![SCROLL_TO_BOTTOM_SCRIPT; 4]);
    assert_eq!(driver.waits(), vec![100; 4]);
}

#[tokio::test]
async fn zero_scrolls_touch_nothing() {
    let mut driver = ScriptedDriver::single(ScriptedPage::new());

    {
        let mut engine = Engine::new(&mut driver);
        engine.scroll_to_load(0, 100).await;
    }

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn failing_scroll_ends_the_loop_early() {
    let mut driver =
        ScriptedDriver::single(ScriptedPage::new()).fail_scripts_after(2, "execution context destroyed");
    let observer = Arc::new(RecordingObserver::new());

    {
        let mut engine = Engine::with_observer(&mut driver, observer.clone());
        engine.scroll_to_load(5, 100).await;
        assert_eq!(engine.metrics().scrolls_performed, 2);
    }

    // the third attempt is the failing one; nothing runs after it
    assert_eq!(driver.evaluated_scripts().len(), 3);
    assert_eq!(driver.waits(), vec![100, 100]);
    assert!(matches!(
        observer.warnings().as_slice(),
        [ExtractionEvent::ScrollStopped { scroll: 3, .. }]
    ));
}

#[tokio::test]
async fn item_list_builds_one_record_per_item_in_order() {
    let page = ScriptedPage::new().with(
        "div.quote",
        vec![
            quote("First", "Albert Einstein"),
            quote("Second", "J.K. Rowling"),
            quote("Third", "Jane Austen"),
        ],
    );
    let mut driver = ScriptedDriver::single(page);

    let result = {
        let mut engine = Engine::new(&mut driver);
        engine.extract(&item_config()).await.unwrap()
    };

    let records = result.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["quote"], FieldValue::from("First"));
    assert_eq!(records[0]["author"], FieldValue::from("Albert Einstein"));
    assert_eq!(records[2]["quote"], FieldValue::from("Third"));
    assert_eq!(
        records[1].keys().collect::<Vec<_>>(),
        vec!["quote", "author"]
    );
}

#[tokio::test]
async fn item_list_navigates_without_extra_wait_then_scrolls() {
    let mut driver = ScriptedDriver::single(ScriptedPage::new());

    {
        let mut engine = Engine::new(&mut driver);
        engine.extract(&item_config()).await.unwrap();
    }

    let calls = driver.calls();
    assert_eq!(
        calls[0],
        DriverCall::Navigate {
            url: "https://quotes.toscrape.com/scroll".into(),
            wait: WaitPolicy::NetworkIdle,
        }
    );
    assert_eq!(calls[1], DriverCall::Wait(0));
    assert_eq!(calls[2], DriverCall::Evaluate(SCROLL_TO_BOTTOM_SCRIPT.into()));
    assert_eq!(driver.waits(), vec![0, 500, 500]);
    assert_eq!(calls.last(), Some(&DriverCall::QueryAll("div.quote".into())));
}

#[tokio::test]
async fn missing_item_child_is_empty_string() {
    let lonely = ScriptedElement::text("").with_child("span.text", ScriptedElement::text("Alone"));
    let page = ScriptedPage::new().with("div.quote", vec![lonely]);
    let mut driver = ScriptedDriver::single(page);
    let observer = Arc::new(RecordingObserver::new());

    let mut engine = Engine::with_observer(&mut driver, observer.clone());
    let result = engine.extract(&item_config()).await.unwrap();

    let record = &result.records()[0];
    assert_eq!(record["quote"], FieldValue::from("Alone"));
    assert_eq!(record["author"], FieldValue::from(""));
    assert!(observer.warnings().is_empty());
}

#[tokio::test]
async fn failing_item_child_is_reported_and_left_empty() {
    let broken = quote("Kept", "Hidden").with_failing_query("small.author", "node detached");
    let page = ScriptedPage::new().with("div.quote", vec![quote("Fine", "Author"), broken]);
    let mut driver = ScriptedDriver::single(page);
    let observer = Arc::new(RecordingObserver::new());

    let mut engine = Engine::with_observer(&mut driver, observer.clone());
    let result = engine.extract(&item_config()).await.unwrap();

    let records = result.records();
    assert_eq!(records[0]["author"], FieldValue::from("Author"));
    assert_eq!(records[1]["quote"], FieldValue::from("Kept"));
    assert_eq!(records[1]["author"], FieldValue::from(""));
    assert_eq!(engine.metrics().items_extracted, 2);

    match observer.warnings().as_slice() {
        [ExtractionEvent::ItemFieldFailed { item, field, .. }] => {
            assert_eq!(*item, 1);
            assert_eq!(field, "author");
        }
        other => panic!("unexpected warnings: {other:?}"),
    }
}

#[tokio::test]
async fn item_query_is_scoped_to_each_item() {
    let page = ScriptedPage::new()
        .with("div.quote", vec![quote("Scoped", "Someone")])
        .with_texts("span.text", &["page-level text"]);
    let mut driver = ScriptedDriver::single(page);

    let result = {
        let mut engine = Engine::new(&mut driver);
        engine.extract(&item_config()).await.unwrap()
    };

    assert_eq!(result.records()[0]["quote"], FieldValue::from("Scoped"));
    assert!(driver
        .calls()
        .iter()
        .any(|call| matches!(call, DriverCall::QueryWithin { selector, .. } if selector == "span.text")));
}
