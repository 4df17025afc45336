use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use scrapekit_core::extract::{INFINITE_SCROLL, LOGIN};
use scrapekit_core::testing::{DriverCall, RecordingObserver, ScriptedDriver, ScriptedPage};
use scrapekit_core::{
    load_scrape_config, CustomExtractor, CustomFunction, CustomRegistry, Engine, ExtractError,
    ExtractResult, ExtractionConfig, ExtractionEvent, ExtractionResult, FieldValue,
    FormattedResult, LoginSection, Record,
};

/// Reads the page heading and appends a marker field.
struct HeadingExtractor;

#[async_trait(?Send)]
impl CustomExtractor for HeadingExtractor {
    fn name(&self) -> &str {
        "heading"
    }

    async fn extract(
        &self,
        engine: &mut Engine<'_>,
        config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        engine.navigate_and_settle(&config.url, 0).await?;
        let mut record = engine.extract_fields(&config.selectors).await;
        record.insert("source".into(), FieldValue::from("custom"));
        Ok(ExtractionResult::Many(vec![record]))
    }
}

struct Refusing;

#[async_trait(?Send)]
impl CustomExtractor for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn extract(
        &self,
        _engine: &mut Engine<'_>,
        _config: &ExtractionConfig,
    ) -> ExtractResult<ExtractionResult> {
        Err(ExtractError::Custom("captcha wall".into()))
    }
}

fn heading_page() -> ScriptedPage {
    ScriptedPage::new()
        .with_texts("h1", &["Quotes to Scrape"])
        .with_texts("div.quote span.text", &["One", "Two"])
}

#[tokio::test]
async fn custom_extractor_takes_over_and_is_formatted() {
    let mut driver = ScriptedDriver::single(heading_page());
    let config = ExtractionConfig::new("https://quotes.toscrape.com/")
        .with_selector("title", "h1")
        .with_custom(CustomFunction::new(HeadingExtractor))
        .with_output_format("json");

    let formatted = {
        let mut engine = Engine::new(&mut driver);
        engine.run(&config).await.unwrap()
    };

    let FormattedResult::Structured(result) = formatted else {
        panic!("expected structured output");
    };
    let records = result.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], FieldValue::from("Quotes to Scrape"));
    assert_eq!(records[0]["source"], FieldValue::from("custom"));
    // the custom extractor chose its own wait; the standard wait never ran
    assert_eq!(driver.waits(), vec![0]);
}

#[tokio::test]
async fn custom_errors_propagate_unchanged() {
    let mut driver = ScriptedDriver::single(heading_page());
    let observer = Arc::new(RecordingObserver::new());
    let config = ExtractionConfig::new("https://quotes.toscrape.com/")
        .with_custom(CustomFunction::new(Refusing));

    let mut engine = Engine::with_observer(&mut driver, observer.clone());
    let err = engine.extract(&config).await.unwrap_err();

    match err {
        ExtractError::Custom(message) => assert_eq!(message, "captcha wall"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(observer.events().contains(&ExtractionEvent::ExtractionFailed {
        kind: "custom".into(),
        error: "custom extraction failed: captcha wall".into(),
    }));
}

#[tokio::test]
async fn unsupported_format_is_rejected_before_navigation() {
    let mut driver = ScriptedDriver::single(heading_page());
    let config = ExtractionConfig::new("https://quotes.toscrape.com/")
        .with_selector("title", "h1")
        .with_output_format("bogus");

    {
        let mut engine = Engine::new(&mut driver);
        match engine.run(&config).await {
            Err(ExtractError::UnsupportedFormat(name)) => assert_eq!(name, "bogus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn tabular_run_flattens_sequences_into_cells() {
    let mut driver = ScriptedDriver::single(heading_page());
    let config = ExtractionConfig::new("https://quotes.toscrape.com/")
        .with_selector("title", "h1")
        .with_selector("quotes", "div.quote span.text")
        .with_output_format("CSV");

    let mut engine = Engine::new(&mut driver);
    let FormattedResult::Tabular(table) = engine.run(&config).await.unwrap() else {
        panic!("expected tabular output");
    };

    assert_eq!(table.columns, vec!["title", "quotes"]);
    assert_eq!(table.len(), 1);
    assert_eq!(table.cell(0, "quotes"), Some("One; Two"));
}

#[tokio::test]
async fn login_fills_the_form_before_extracting() {
    let mut driver = ScriptedDriver::single(heading_page());
    let registry = CustomRegistry::with_builtins();
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/login")
        .with_selector("title", "h1")
        .with_wait_millis(1000)
        .with_login(LoginSection {
            username: Some("demo".into()),
            password: Some("secret".into()),
            username_selector: Some("#username".into()),
            password_selector: Some("#password".into()),
            submit_selector: Some("input[type=submit]".into()),
            ..LoginSection::default()
        });
    config.custom_function = Some(LOGIN.into());
    let config = registry.resolve(config).unwrap();

    let result = {
        let mut engine = Engine::new(&mut driver);
        engine.extract(&config).await.unwrap()
    };

    let calls = driver.calls();
    assert_eq!(calls[1], DriverCall::Wait(0));
    assert_eq!(
        calls[2],
        DriverCall::Fill {
            selector: "#username".into(),
            text: "demo".into(),
        }
    );
    assert_eq!(
        calls[3],
        DriverCall::Fill {
            selector: "#password".into(),
            text: "secret".into(),
        }
    );
    assert_eq!(calls[4], DriverCall::Click("input[type=submit]".into()));
    assert_eq!(calls[5], DriverCall::Wait(3000));
    assert!(matches!(calls[6], DriverCall::Navigate { .. }));
    assert_eq!(calls[7], DriverCall::Wait(1000));

    let ExtractionResult::Single(record) = result else {
        panic!("expected a single record");
    };
    assert_eq!(record["title"], FieldValue::from("Quotes to Scrape"));
}

#[tokio::test]
async fn login_without_credentials_skips_the_form() {
    let mut driver = ScriptedDriver::single(heading_page());
    let registry = CustomRegistry::with_builtins();
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/login")
        .with_selector("title", "h1");
    config.custom_function = Some(LOGIN.into());
    let config = registry.resolve(config).unwrap();

    {
        let mut engine = Engine::new(&mut driver);
        engine.extract(&config).await.unwrap();
    }

    assert!(!driver
        .calls()
        .iter()
        .any(|call| matches!(call, DriverCall::Fill { .. } | DriverCall::Click(_))));
}

#[tokio::test]
async fn login_with_invalid_pagination_never_touches_the_page() {
    let mut driver = ScriptedDriver::single(heading_page());
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/login")
        .with_selector("title", "h1")
        .with_login(LoginSection {
            username: Some("demo".into()),
            password: Some("secret".into()),
            username_selector: Some("#username".into()),
            password_selector: Some("#password".into()),
            submit_selector: Some("input[type=submit]".into()),
            ..LoginSection::default()
        });
    config.multi_page = true;
    config.custom_function = Some(LOGIN.into());
    let config = CustomRegistry::with_builtins().resolve(config).unwrap();

    {
        let mut engine = Engine::new(&mut driver);
        let err = engine.extract(&config).await.unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("pagination_selector"));
    }

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn login_with_credentials_but_no_form_selectors_never_touches_the_page() {
    let mut driver = ScriptedDriver::single(heading_page());
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/login").with_login(
        LoginSection {
            username: Some("demo".into()),
            password: Some("secret".into()),
            ..LoginSection::default()
        },
    );
    config.custom_function = Some(LOGIN.into());
    let config = CustomRegistry::with_builtins().resolve(config).unwrap();

    {
        let mut engine = Engine::new(&mut driver);
        let err = engine.extract(&config).await.unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn scroll_builtin_without_item_selector_never_touches_the_page() {
    let mut driver = ScriptedDriver::single(heading_page());
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/scroll")
        .with_item_field("quote", "span.text");
    config.custom_function = Some(INFINITE_SCROLL.into());
    let config = CustomRegistry::with_builtins().resolve(config).unwrap();

    {
        let mut engine = Engine::new(&mut driver);
        let err = engine.extract(&config).await.unwrap_err();
        assert!(err.to_string().contains("item_selector"));
    }

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn unresolved_custom_name_is_a_configuration_error() {
    let mut driver = ScriptedDriver::single(heading_page());
    let mut config = ExtractionConfig::new("https://quotes.toscrape.com/");
    config.custom_function = Some("not_registered".into());

    let mut engine = Engine::new(&mut driver);
    let err = engine.extract(&config).await.unwrap_err();

    assert_eq!(err.kind(), "configuration");
}

#[tokio::test]
async fn scroll_fixture_resolves_to_the_item_list_builtin() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/quotes_scroll.yaml");
    let scrape = load_scrape_config(&path).unwrap();
    let config = CustomRegistry::with_builtins()
        .resolve(scrape.extraction)
        .unwrap();

    assert_eq!(
        config.custom.as_ref().map(CustomFunction::name),
        Some(INFINITE_SCROLL)
    );

    let item = scrapekit_core::testing::ScriptedElement::text("")
        .with_child("span.text", scrapekit_core::testing::ScriptedElement::text("Quote"));
    let page = ScriptedPage::new().with("div.quote", vec![item]);
    let mut driver = ScriptedDriver::single(page);
    let mut engine = Engine::new(&mut driver);
    let records: Vec<Record> = engine.extract(&config).await.unwrap().into_records();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["quote"], FieldValue::from("Quote"));
}
