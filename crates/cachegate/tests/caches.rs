// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for configured caches and raw connection access.

use std::sync::Arc;
use std::time::Duration;

use cachegate::{
    CacheClient, CacheFacade, CacheSettings, Caches, CachesConfig, ClientRegistry, Error, ErrorKind, Expiry,
    GlobalDefaults, Ttl,
};
use cachegate_client::testing::MockClient;

type TestResult = Result<(), Error>;

#[derive(Debug, PartialEq, Eq)]
struct ClusterConnection {
    node: &'static str,
}

fn boxed(client: MockClient<i64>) -> Box<dyn CacheClient<i64>> {
    Box::new(client)
}

fn mock_registry(mock: &MockClient<i64>) -> ClientRegistry<i64> {
    let mock = mock.clone();
    ClientRegistry::new().with("mock", move |handle| Ok(boxed(mock.construct(&handle))))
}

#[test]
fn configured_caches_use_the_memory_client() -> TestResult {
    let config = CachesConfig::from_json(
        r#"{
            "default": {"LOCATION": "127.0.0.1:7000", "TIMEOUT": 60},
            "sessions": {"KEY_PREFIX": "s", "OPTIONS": {"CLIENT_CLASS": "memory", "IGNORE_EXCEPTIONS": true}}
        }"#,
    )?;
    let caches = Caches::<i64>::new(config, &ClientRegistry::default(), &GlobalDefaults::default())?;

    assert_eq!(caches.aliases().collect::<Vec<_>>(), ["default", "sessions"]);

    let default = caches.default_cache()?;
    assert!(!default.policy().ignores_failures());
    assert!(default.set("visits", 10, Expiry::Default, None)?);
    assert_eq!(default.incr("visits", 5, None)?, Some(15));
    assert_eq!(default.decr("visits", 20, None)?, Some(-5));
    assert!(matches!(default.ttl("visits", None)?, Some(Ttl::Expires(d)) if d <= Duration::from_secs(60)));

    let sessions = caches.get("sessions")?;
    assert!(sessions.policy().ignores_failures());
    assert_eq!(sessions.get("visits", None, None)?, None);
    assert!(sessions.set("user:1", 1, Expiry::Never, None)?);
    assert_eq!(sessions.ttl("user:1", None)?, Some(Ttl::Persistent));
    assert_eq!(sessions.keys("user:*", None)?, ["user:1"]);
    Ok(())
}

#[test]
fn the_same_facade_is_returned_for_an_alias() -> TestResult {
    let config = CachesConfig::from_json(r#"{"default": {}}"#)?;
    let caches = Caches::<i64>::new(config, &ClientRegistry::default(), &GlobalDefaults::default())?;

    let first = caches.default_cache()?;
    first.set("k", 1, Expiry::Default, None)?;
    let second = caches.get("default")?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.get("k", None, None)?, Some(1));
    Ok(())
}

#[test]
fn unknown_alias_is_invalid_usage() -> TestResult {
    let caches = Caches::<i64>::new(CachesConfig::new(), &ClientRegistry::default(), &GlobalDefaults::default())?;

    let error = caches.get("sessions").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidUsage);
    assert!(error.to_string().contains("sessions"));

    assert_eq!(caches.default_cache().unwrap_err().kind(), ErrorKind::InvalidUsage);
    Ok(())
}

#[test]
fn unknown_client_class_fails_the_whole_configuration() {
    let config = CachesConfig::from_json(r#"{"default": {"OPTIONS": {"CLIENT_CLASS": "cluster"}}}"#).unwrap();

    let error = Caches::<i64>::new(config, &ClientRegistry::default(), &GlobalDefaults::default()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Configuration);
}

#[test]
fn raw_connection_is_unsupported_without_provider() -> TestResult {
    let mock = MockClient::<i64>::new();
    let config = CachesConfig::new().with("default", settings_for("mock"));
    let caches = Caches::new(config, &mock_registry(&mock), &GlobalDefaults::default())?;

    let error = caches.raw_connection("default", true).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);
    assert!(error.to_string().contains("raw_connection"));
    Ok(())
}

#[test]
fn raw_connection_is_unsupported_by_the_memory_client() -> TestResult {
    let config = CachesConfig::from_json(r#"{"default": {}}"#)?;
    let caches = Caches::<i64>::new(config, &ClientRegistry::default(), &GlobalDefaults::default())?;

    assert_eq!(
        caches.raw_connection("default", false).unwrap_err().kind(),
        ErrorKind::Unsupported
    );
    Ok(())
}

#[test]
fn raw_connection_comes_from_the_client() -> TestResult {
    let mock = MockClient::<i64>::new().with_raw_connection(ClusterConnection { node: "primary" });
    let config = CachesConfig::new().with("default", settings_for("mock"));
    let caches = Caches::new(config, &mock_registry(&mock), &GlobalDefaults::default())?;

    let connection = caches.raw_connection_as::<ClusterConnection>("default", true)?;
    assert_eq!(*connection, ClusterConnection { node: "primary" });
    assert_eq!(mock.constructions(), 1);

    let error = caches.raw_connection_as::<String>("default", true).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidUsage);

    assert_eq!(caches.raw_connection("missing", true).unwrap_err().kind(), ErrorKind::InvalidUsage);
    Ok(())
}

#[test]
fn raw_connection_failures_are_not_absorbed() {
    let mock = MockClient::<i64>::new().with_raw_connection(ClusterConnection { node: "primary" });
    mock.fail_when(ErrorKind::Connectivity, |_| true);
    let mut settings = settings_for("mock");
    settings.options.ignore_exceptions = Some(true);
    let facade = CacheFacade::new("default", settings, &mock_registry(&mock), &GlobalDefaults::default()).unwrap();

    let error = facade.raw_connection(false).unwrap_err();
    assert!(error.is_connectivity());
}

fn settings_for(client: &str) -> CacheSettings {
    let mut settings = CacheSettings::default();
    client.clone_into(&mut settings.options.client);
    settings
}
