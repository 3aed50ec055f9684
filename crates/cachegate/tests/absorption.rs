// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for failure absorption across every facade operation.

use std::collections::HashMap;
use std::time::Duration;

use cachegate::{
    BackendOptions, CacheClient, CacheFacade, CacheSettings, Error, ErrorKind, Expiry, GlobalDefaults, LockOptions,
};
use cachegate_client::testing::{ClientOp, LogCapture, MockClient};

type TestResult = Result<(), Error>;

const OPERATIONS: [&str; 19] = [
    "add",
    "set",
    "set_many",
    "get",
    "get_many",
    "delete",
    "delete_pattern",
    "delete_many",
    "clear",
    "keys",
    "iter_keys",
    "has_key",
    "lock",
    "incr",
    "decr",
    "incr_version",
    "ttl",
    "persist",
    "expire",
];

fn boxed(client: MockClient<i64>) -> Box<dyn CacheClient<i64>> {
    Box::new(client)
}

fn facade(mock: &MockClient<i64>, ignore: Option<bool>, defaults: &GlobalDefaults) -> CacheFacade<i64> {
    let settings = CacheSettings {
        options: BackendOptions {
            ignore_exceptions: ignore,
            ..BackendOptions::default()
        },
        ..CacheSettings::default()
    };
    let mock = mock.clone();
    CacheFacade::with_factory("default", settings, move |handle| Ok(boxed(mock.construct(&handle))), defaults)
}

/// Invokes the facade operation `name` and renders its value.
fn invoke(facade: &CacheFacade<i64>, name: &str) -> Result<String, Error> {
    Ok(match name {
        "add" => format!("{:?}", facade.add("k", 1, Expiry::Default, None)?),
        "set" => format!("{:?}", facade.set("k", 1, Expiry::Default, None)?),
        "set_many" => format!(
            "{:?}",
            facade.set_many(HashMap::from([("k".to_string(), 1)]), Expiry::Default, None)?
        ),
        "get" => format!("{:?}", facade.get("k", None, None)?),
        "get_many" => format!("{:?}", facade.get_many(&["k"], None)?),
        "delete" => format!("{:?}", facade.delete("k", None)?),
        "delete_pattern" => format!("{:?}", facade.delete_pattern("k*", None)?),
        "delete_many" => format!("{:?}", facade.delete_many(&["k"], None)?),
        "clear" => format!("{:?}", facade.clear()?),
        "keys" => format!("{:?}", facade.keys("*", None)?),
        "iter_keys" => format!("{:?}", facade.iter_keys("*", None)?.collect::<Result<Vec<_>, _>>()?),
        "has_key" => format!("{:?}", facade.has_key("k", None)?),
        "lock" => format!("{:?}", facade.lock("k", LockOptions::new())?.map(|_| "lock")),
        "incr" => format!("{:?}", facade.incr("k", 1, None)?),
        "decr" => format!("{:?}", facade.decr("k", 1, None)?),
        "incr_version" => format!("{:?}", facade.incr_version("k", 1, None)?),
        "ttl" => format!("{:?}", facade.ttl("k", None)?),
        "persist" => format!("{:?}", facade.persist("k", None)?),
        "expire" => format!("{:?}", facade.expire("k", Duration::from_secs(1), None)?),
        other => panic!("unknown operation {other}"),
    })
}

fn fallback(name: &str) -> &'static str {
    match name {
        "add" | "set" | "delete" | "has_key" | "persist" | "expire" => "false",
        "set_many" | "clear" => "()",
        "get" | "lock" | "incr" | "decr" | "incr_version" | "ttl" => "None",
        "get_many" => "{}",
        "delete_pattern" | "delete_many" => "0",
        "keys" | "iter_keys" => "[]",
        other => panic!("unknown operation {other}"),
    }
}

#[test]
fn connectivity_failures_propagate_when_not_ignored() {
    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let facade = facade(&mock, Some(false), &GlobalDefaults::default());

    for name in OPERATIONS {
        let error = invoke(&facade, name).expect_err(name);
        assert_eq!(error.kind(), ErrorKind::Connectivity, "{name}");
    }
}

#[test]
fn connectivity_failures_propagate_by_default() {
    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let facade = facade(&mock, None, &GlobalDefaults::default());

    for name in OPERATIONS {
        assert!(invoke(&facade, name).is_err(), "{name}");
    }
}

#[test]
fn connectivity_failures_return_fallbacks_when_ignored() {
    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    for name in OPERATIONS {
        let rendered = invoke(&facade, name).unwrap_or_else(|e| panic!("{name} was not absorbed: {e}"));
        assert_eq!(rendered, fallback(name), "{name}");
    }
}

#[test]
fn other_failures_always_propagate() {
    for kind in [ErrorKind::Configuration, ErrorKind::Unsupported, ErrorKind::InvalidUsage] {
        for ignore in [Some(false), Some(true), None] {
            let mock = MockClient::<i64>::new();
            mock.fail_when(kind, |_| true);
            let facade = facade(&mock, ignore, &GlobalDefaults::default());

            for name in OPERATIONS {
                let error = invoke(&facade, name).expect_err(name);
                assert_eq!(error.kind(), kind, "{name} with ignore={ignore:?}");
            }
        }
    }
}

#[test]
fn process_defaults_enable_absorption() {
    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let defaults = GlobalDefaults {
        ignore_exceptions: true,
        ..GlobalDefaults::default()
    };

    let inherited = facade(&mock, None, &defaults);
    assert_eq!(invoke(&inherited, "get_many").unwrap(), "{}");

    let overridden = facade(&mock, Some(false), &defaults);
    assert!(invoke(&overridden, "get_many").is_err());
}

#[test]
fn successful_operations_pass_through() -> TestResult {
    let mock = MockClient::<i64>::new();
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    assert!(facade.add("a", 1, Expiry::Default, None)?);
    assert!(!facade.add("a", 2, Expiry::Default, None)?);
    assert!(facade.set("b", 2, Duration::from_secs(5), None)?);
    assert_eq!(facade.get_many(&["a", "b", "c"], None)?.len(), 2);
    assert_eq!(facade.keys("*", None)?, ["a", "b"]);
    assert!(facade.has_key("a", None)?);
    assert_eq!(facade.delete_many(&["a", "c"], None)?, 1);

    assert_eq!(
        mock.operations()[..3],
        [
            ClientOp::Add("a".to_string()),
            ClientOp::Add("a".to_string()),
            ClientOp::Set("b".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn only_failing_operations_are_absorbed() -> TestResult {
    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |op| matches!(op, ClientOp::Get(_)));
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    assert!(facade.set("k", 5, Expiry::Default, None)?);
    assert_eq!(facade.get("k", Some(-1), None)?, Some(-1));
    assert_eq!(facade.get_many(&["k"], None)?, HashMap::from([("k".to_string(), 5)]));

    mock.clear_failures();
    assert_eq!(facade.get("k", Some(-1), None)?, Some(5));
    Ok(())
}

#[test]
fn get_returns_caller_default_on_absorbed_failure() -> TestResult {
    let mock = MockClient::<i64>::new();
    mock.seed("k", 7);
    mock.fail_when(ErrorKind::Connectivity, |op| matches!(op, ClientOp::Get(_)));
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    assert_eq!(facade.get("k", None, None)?, None);
    assert_eq!(facade.get("k", Some(0), None)?, Some(0));
    assert_eq!(facade.get("k", Some(42), None)?, Some(42));
    Ok(())
}

#[test]
fn get_default_can_be_a_map() -> TestResult {
    let mock = MockClient::<HashMap<String, i64>>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let settings = CacheSettings {
        options: BackendOptions {
            ignore_exceptions: Some(true),
            ..BackendOptions::default()
        },
        ..CacheSettings::default()
    };
    let facade = CacheFacade::with_factory(
        "default",
        settings,
        move |handle| {
            let client: Box<dyn CacheClient<HashMap<String, i64>>> = Box::new(mock.construct(&handle));
            Ok(client)
        },
        &GlobalDefaults::default(),
    );

    assert_eq!(facade.get("k", Some(HashMap::new()), None)?, Some(HashMap::new()));
    Ok(())
}

#[test]
fn get_default_applies_to_misses() -> TestResult {
    let mock = MockClient::<i64>::new();
    let facade = facade(&mock, Some(false), &GlobalDefaults::default());

    assert_eq!(facade.get("missing", Some(3), None)?, Some(3));
    assert_eq!(facade.get("missing", None, None)?, None);
    Ok(())
}

#[test]
fn iter_keys_yields_client_keys() -> TestResult {
    let mock = MockClient::<i64>::new();
    mock.seed("a", 1);
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    let keys: Vec<String> = facade.iter_keys("*", None)?.collect::<Result<_, _>>()?;
    assert_eq!(keys, ["a"]);
    Ok(())
}

#[test]
fn absorbed_failure_logs_one_entry() -> TestResult {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |op| matches!(op, ClientOp::Get(key) if key == "k"));
    let settings = CacheSettings {
        options: BackendOptions {
            ignore_exceptions: Some(true),
            log_ignored_exceptions: Some(true),
            ..BackendOptions::default()
        },
        ..CacheSettings::default()
    };
    let factory_mock = mock.clone();
    let facade = CacheFacade::with_factory(
        "default",
        settings,
        move |handle| Ok(boxed(factory_mock.construct(&handle))),
        &GlobalDefaults::default(),
    );

    assert_eq!(facade.get("k", Some(42), None)?, Some(42));

    assert_eq!(capture.count("cache.failure_ignored"), 1);
    capture.assert_contains("cache.operation=\"cache.get\"");
    capture.assert_contains("mock: Get(\"k\") failed");
    Ok(())
}

#[test]
fn absorbed_failure_is_not_logged_when_disabled() -> TestResult {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let facade = facade(&mock, Some(true), &GlobalDefaults::default());

    assert!(!facade.delete("k", None)?);
    assert_eq!(capture.count("cache.failure_ignored"), 0);
    Ok(())
}

#[test]
fn logger_identity_comes_from_defaults() -> TestResult {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let mock = MockClient::<i64>::new();
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let defaults = GlobalDefaults {
        ignore_exceptions: true,
        log_ignored_exceptions: true,
        logger: "shop.cache".to_string(),
    };
    let facade = facade(&mock, None, &defaults);

    facade.clear()?;
    capture.assert_contains("logger=\"shop.cache\"");
    Ok(())
}
