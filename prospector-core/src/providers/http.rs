use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::providers::digest::{DigestError, DigestSender};
use crate::providers::runner::{RunContext, RunFailure, Runner};
use crate::types::{CrawlerConfig, CrawlerId, RunLogId, RunReport};

fn endpoint(base: &Url, crawler: CrawlerId, suffix: &str) -> String {
    format!(
        "{}/crawlers/{}/{}",
        base.as_str().trim_end_matches('/'),
        crawler,
        suffix
    )
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    run_id: RunLogId,
    config: &'a CrawlerConfig,
}

/// Error body a runner may return with a non-success status.
#[derive(Debug, Default, Deserialize)]
struct RunnerErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    partial: Option<RunReport>,
}

/// Runner living in a separate worker service.
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: Client,
    base_url: Url,
}

impl HttpRunner {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Runner for HttpRunner {
    async fn execute(&self, ctx: RunContext) -> Result<RunReport, RunFailure> {
        let url = endpoint(&self.base_url, ctx.config.id, "execute");
        debug!(%url, run_id = %ctx.run_id, "dispatching crawler run");
        ctx.progress.report("dispatched to runner", 0, 0);

        let response = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                run_id: ctx.run_id,
                config: &ctx.config,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<RunReport>().await?);
        }

        // 422 carries a structured failure with optional partial counters;
        // anything else is treated as the runner rejecting the call.
        let text = response.text().await.unwrap_or_default();
        let body: RunnerErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let message = body.error.unwrap_or_else(|| "run failed".to_string());
            return Err(match body.partial {
                Some(partial) => RunFailure::with_partial(message, partial),
                None => RunFailure::failed(message),
            });
        }

        warn!(%url, status = status.as_u16(), "runner rejected crawler run");
        Err(RunFailure::Rejected {
            status: status.as_u16(),
            message: body.error.unwrap_or(text),
        })
    }
}

#[derive(Debug, Serialize)]
struct DigestRequest<'a> {
    recipients: &'a [String],
    model: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct HttpDigestSender {
    client: Client,
    base_url: Url,
}

impl HttpDigestSender {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl DigestSender for HttpDigestSender {
    async fn send_test_digest(&self, config: &CrawlerConfig) -> Result<(), DigestError> {
        if config.digest.recipients.is_empty() {
            return Err(DigestError::NoRecipients);
        }

        let url = endpoint(&self.base_url, config.id, "digest/test");
        let response = self
            .client
            .post(&url)
            .json(&DigestRequest {
                recipients: &config.digest.recipients,
                model: config.digest.model.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%url, "test digest accepted");
            return Ok(());
        }

        Err(DigestError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::event_bus::CrawlerEventBus;
    use crate::providers::ProgressReporter;
    use crate::types::{NewCrawlerConfig, TargetEntity, TenantId, UserId};

    fn crawler(recipients: &[&str]) -> CrawlerConfig {
        let mut config = CrawlerConfig::from_new(
            TenantId::new(),
            UserId::new(),
            NewCrawlerConfig {
                name: "Roofers".into(),
                target_entity: TargetEntity::Organization,
                enabled: true,
                interval_seconds: 600,
                concurrent_searches: 1,
                compilation_target: 10,
                disable_on_compiled: false,
                search: Default::default(),
                digest: Default::default(),
                agent: Default::default(),
            },
            Utc::now(),
        );
        config.digest.recipients = recipients.iter().map(|r| r.to_string()).collect();
        config
    }

    fn context(config: CrawlerConfig) -> RunContext {
        let run_id = RunLogId::new();
        RunContext {
            progress: ProgressReporter::new(Arc::new(CrawlerEventBus::new(4)), config.id, run_id),
            config,
            run_id,
        }
    }

    async fn runner_answering(template: ResponseTemplate) -> (MockServer, HttpRunner) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
        let base = Url::parse(&server.uri()).expect("mock server url");
        (server, HttpRunner::new(Client::new(), base))
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let id = CrawlerId(Uuid::from_u128(1));
        let with = Url::parse("http://runner.internal:9000/v1/").expect("url");
        let without = Url::parse("http://runner.internal:9000/v1").expect("url");

        let expected = format!("http://runner.internal:9000/v1/crawlers/{id}/execute");
        assert_eq!(endpoint(&with, id, "execute"), expected);
        assert_eq!(endpoint(&without, id, "execute"), expected);
    }

    #[test]
    fn runner_error_body_is_lenient() {
        let body: RunnerErrorBody =
            serde_json::from_str(r#"{"error":"quota","partial":{"leads_found":3}}"#)
                .expect("parse");
        assert_eq!(body.error.as_deref(), Some("quota"));
        assert_eq!(body.partial.map(|p| p.leads_found), Some(3));
    }

    #[tokio::test]
    async fn runner_success_returns_report() {
        let config = crawler(&[]);
        let ctx = context(config.clone());
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/crawlers/{}/execute", config.id)))
            .and(body_partial_json(json!({ "run_id": ctx.run_id })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "leads_found": 7,
                "prospects_found": 4,
                "proposals_created": 2,
                "search_query": "dachdecker graz"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let runner = HttpRunner::new(Client::new(), Url::parse(&server.uri()).expect("url"));

        let report = runner.execute(ctx).await.expect("report");
        assert_eq!(report.leads_found, 7);
        assert_eq!(report.proposals_created, 2);
        assert_eq!(report.search_query.as_deref(), Some("dachdecker graz"));
    }

    #[tokio::test]
    async fn runner_422_is_failure_with_partial_counts() {
        let (_server, runner) = runner_answering(ResponseTemplate::new(422).set_body_json(json!({
            "error": "search quota exhausted",
            "partial": { "leads_found": 3, "proposals_created": 1 }
        })))
        .await;

        let failure = runner.execute(context(crawler(&[]))).await.expect_err("failure");
        match &failure {
            RunFailure::Failed { message, partial } => {
                assert_eq!(message, "search quota exhausted");
                let partial = partial.as_ref().expect("partial counts");
                assert_eq!(partial.leads_found, 3);
                assert_eq!(partial.proposals_created, 1);
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[tokio::test]
    async fn runner_422_without_body_still_fails() {
        let (_server, runner) = runner_answering(ResponseTemplate::new(422)).await;

        let failure = runner.execute(context(crawler(&[]))).await.expect_err("failure");
        assert!(matches!(
            failure,
            RunFailure::Failed { ref message, partial: None } if message == "run failed"
        ));
    }

    #[tokio::test]
    async fn runner_other_status_is_rejection() {
        let (_server, runner) = runner_answering(
            ResponseTemplate::new(503).set_body_string("worker pool drained"),
        )
        .await;

        let failure = runner.execute(context(crawler(&[]))).await.expect_err("rejected");
        match failure {
            RunFailure::Rejected { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "worker pool drained");
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[tokio::test]
    async fn digest_is_posted_to_recipients() {
        let config = crawler(&["ops@example.com"]);
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/crawlers/{}/digest/test", config.id)))
            .and(body_partial_json(json!({ "recipients": ["ops@example.com"] })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        let sender =
            HttpDigestSender::new(Client::new(), Url::parse(&server.uri()).expect("url"));

        sender.send_test_digest(&config).await.expect("sent");
    }

    #[tokio::test]
    async fn digest_rejection_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("mailer offline"))
            .expect(1)
            .mount(&server)
            .await;
        let sender =
            HttpDigestSender::new(Client::new(), Url::parse(&server.uri()).expect("url"));

        let err = sender
            .send_test_digest(&crawler(&["ops@example.com"]))
            .await
            .expect_err("rejected");
        match err {
            DigestError::Rejected { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "mailer offline");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn digest_without_recipients_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let sender =
            HttpDigestSender::new(Client::new(), Url::parse(&server.uri()).expect("url"));

        let err = sender.send_test_digest(&crawler(&[])).await.expect_err("no recipients");
        assert!(matches!(err, DigestError::NoRecipients));
    }
}
