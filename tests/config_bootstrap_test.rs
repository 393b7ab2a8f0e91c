//! Building the request layer from a configuration file

use anyhow::Result;
use iaso_caching::{query_fn, QueryContext, QueryOptions};
use iaso_config::{ConfigLoader, IasoConfig};
use iaso_core::NotificationQueue;
use iaso_http::{Api, HttpConfig};
use iaso_query::SnackClient;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(base_url: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    write!(
        file,
        r#"
api:
  base_url: "{base_url}"
  timeout: 5
query:
  stale_time: 60000
  cache_time: 1000
  retry: 0
messages:
  query_error:
    id: forms.loadError
    defaultMessage: "Could not load forms"
logging:
  level: debug
  format: compact
"#
    )?;
    Ok(file)
}

#[tokio::test]
async fn test_client_built_from_file_uses_configured_defaults() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/forms/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_config(&server.uri())?;
    let config = ConfigLoader::new().from_file(file.path())?;
    iaso_logging::init_logging_from_config(&config.logging)?;

    let queue = Arc::new(NotificationQueue::new());
    let client = SnackClient::from_config(&config, queue.clone());
    let api = Api::from_config(HttpConfig::from(config.api.clone()))?;

    assert_eq!(client.queries().defaults().stale_time, Duration::from_secs(60));
    assert_eq!(client.queries().defaults().retry, 0);

    let mut forms = client.snack_query((
        "forms",
        query_fn(move |context: QueryContext| {
            let api = api.clone();
            async move {
                api.get_cancellable::<Value>("/api/forms/", &context.token)
                    .await?
                    .into_result()
            }
        }),
    ));

    assert!(forms.settled().await.is_error());
    let notification = queue.try_next().expect("error notification");
    assert_eq!(notification.text(), "Could not load forms");
    Ok(())
}

#[tokio::test]
async fn test_fresh_data_is_served_from_cache() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_config(&server.uri())?;
    let config = ConfigLoader::new().from_file(file.path())?;
    let client = SnackClient::from_config(&config, Arc::new(NotificationQueue::new()));
    let api = Api::from_config(HttpConfig::from(config.api.clone()))?;

    let call = || {
        let api = api.clone();
        (
            "projects",
            query_fn(move |context: QueryContext| {
                let api = api.clone();
                async move {
                    api.get_cancellable::<Value>("/api/projects/", &context.token)
                        .await?
                        .into_result()
                }
            }),
            iaso_core::SnackMessage::Default,
            QueryOptions::new(),
        )
    };

    let first = client.fetch_snack_query(call()).await?;
    let second = client.fetch_snack_query(call()).await?;
    assert_eq!(first, second);
    assert_eq!(client.queries().stats().hits, 1);
    Ok(())
}

#[test]
fn test_environment_overrides_query_defaults() -> Result<()> {
    let config: IasoConfig = temp_env::with_vars(
        [
            ("IASO_QUERY_RETRY", Some("1")),
            ("IASO_QUERY_STALE_TIME_MS", Some("2500")),
        ],
        || ConfigLoader::new().from_env(),
    )?;

    let defaults = iaso_query::query_defaults(&config.query);
    assert_eq!(defaults.retry, 1);
    assert_eq!(defaults.stale_time, Duration::from_millis(2500));
    assert_eq!(defaults.mutation_retry, 0);
    Ok(())
}
