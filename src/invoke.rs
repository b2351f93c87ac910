use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{EnvDefaults, ScrapeConfig, ScrapeInputs};
use crate::pipeline::{self, RunSummary};
use crate::source::{HttpSource, PageSource};
use crate::store::{ObjectStore, S3Store};
use crate::telemetry;
use crate::telemetry::ops::invoke::Phase as InvokePhase;

const DEFAULT_DELAY_SECS: f64 = 1.0;

/// `closet invoke` runs one serverless-style invocation from a JSON event.
#[derive(Args, Debug)]
pub struct InvokeCmd {
    /// Event file, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub event: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Event {
    pub username: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
    pub incremental: Option<bool>,
    pub delay: Option<f64>,
    pub max_pages: Option<usize>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON document encoded as a string.
    pub body: String,
}

impl Response {
    fn new(status_code: u16, body: Value) -> Self {
        Response { status_code, body: body.to_string() }
    }

    fn bad_request(msg: &str) -> Self {
        Response::new(400, json!({ "error": msg }))
    }

    fn failed(err: &anyhow::Error) -> Self {
        Response::new(500, json!({ "success": false, "error": format!("{:#}", err) }))
    }

    fn ok(summary: &RunSummary) -> Self {
        Response::new(200, json!({
            "success": true,
            "stats": {
                "total": summary.written_remote,
                "new": summary.new,
                "updated": summary.updated,
                "skipped": summary.skipped,
                "found": summary.found,
                "errors": summary.errors.len(),
            },
            "errors": summary.errors,
        }))
    }
}

/// Resolve an event into a run configuration. Invocations always write
/// remotely only and always fetch details.
pub fn prepare(event: Event, envd: &EnvDefaults) -> Result<ScrapeConfig, Response> {
    let username = event.username.filter(|u| !u.trim().is_empty()).ok_or_else(|| Response::bad_request("username not specified"))?;
    let inputs = ScrapeInputs {
        username,
        bucket: event.s3_bucket,
        prefix: event.s3_prefix,
        delay_secs: event.delay,
        max_pages: event.max_pages,
        visit_details: Some(true),
        incremental: event.incremental,
        remote_only: true,
        format: None,
        output: None,
    };
    let cfg = ScrapeConfig::resolve(inputs, envd, DEFAULT_DELAY_SECS);
    if cfg.remote.is_none() {
        return Err(Response::bad_request("S3 bucket not specified"));
    }
    Ok(cfg)
}

/// Run a prepared invocation against the given collaborators.
pub async fn handle_with(cfg: &ScrapeConfig, source: &dyn PageSource, store: &dyn ObjectStore, out_dir: &Path) -> Response {
    let log = telemetry::scrape();
    match pipeline::run(cfg, source, Some(store), out_dir, &log).await {
        Ok(outcome) => Response::ok(&outcome.summary),
        Err(e) => Response::failed(&e),
    }
}

pub async fn handle(event: Event, envd: &EnvDefaults) -> Response {
    let cfg = match prepare(event, envd) {
        Ok(cfg) => cfg,
        Err(resp) => return resp,
    };
    let source = match HttpSource::new(cfg.timeout) {
        Ok(s) => s,
        Err(e) => return Response::failed(&e),
    };
    let bucket = cfg.remote.as_ref().map(|r| r.bucket.clone()).unwrap_or_default();
    let store = S3Store::from_env(bucket).await;
    handle_with(&cfg, &source, &store, &std::env::temp_dir()).await
}

fn read_event(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading event from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("reading event file {}", path))
    }
}

/// An empty payload is an empty event; malformed JSON is the caller's error.
pub fn parse_event(raw: &str) -> Result<Event, Response> {
    if raw.trim().is_empty() {
        return Ok(Event::default());
    }
    serde_json::from_str(raw).map_err(|e| Response::bad_request(&format!("invalid event: {}", e)))
}

pub async fn run(args: InvokeCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::invoke();
    let _root = log.root_span_kv([("event", args.event.clone())]).entered();

    let event = {
        let _s = log.span(&InvokePhase::ReadEvent).entered();
        parse_event(&read_event(&args.event)?)
    };
    let response = match event {
        Ok(event) => {
            let _s = log.span(&InvokePhase::Run).entered();
            handle(event, &EnvDefaults::from_env()).await
        }
        Err(resp) => resp,
    };
    log.info_kv("📬 invocation finished", [("status", response.status_code.to_string())]);

    if telemetry::config::json_mode() {
        log.result(&response, started)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{MockReply, MockSource};
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    fn event(v: Value) -> Event {
        serde_json::from_value(v).unwrap()
    }

    fn body(r: &Response) -> Value {
        serde_json::from_str(&r.body).unwrap()
    }

    #[test]
    fn missing_bucket_is_400() {
        let r = prepare(event(json!({"username": "alice"})), &EnvDefaults::default()).unwrap_err();
        assert_eq!(r.status_code, 400);
        assert_eq!(body(&r)["error"], "S3 bucket not specified");
    }

    #[test]
    fn missing_username_is_400() {
        let envd = EnvDefaults { bucket: Some("b".into()), ..Default::default() };
        let r = prepare(event(json!({})), &envd).unwrap_err();
        assert_eq!(r.status_code, 400);
    }

    #[test]
    fn event_defaults() {
        let envd = EnvDefaults { bucket: Some("env-bucket".into()), ..Default::default() };
        let cfg = prepare(event(json!({"username": "alice"})), &envd).unwrap();
        assert_eq!(cfg.delay, Duration::from_secs(1));
        assert_eq!(cfg.max_pages, 200);
        assert!(cfg.incremental);
        assert!(cfg.visit_details);
        assert!(!cfg.writes_local());
        assert_eq!(cfg.remote.unwrap().prefix, "alice");
    }

    #[test]
    fn malformed_event_is_400() {
        let r = parse_event("{\"username\": ").unwrap_err();
        assert_eq!(r.status_code, 400);
        assert!(body(&r)["error"].as_str().unwrap().starts_with("invalid event"));
        assert!(parse_event("  \n").unwrap().username.is_none());
        assert_eq!(parse_event(r#"{"username":"bob"}"#).unwrap().username.as_deref(), Some("bob"));
    }

    #[test]
    fn huge_delay_is_capped() {
        let envd = EnvDefaults { bucket: Some("b".into()), ..Default::default() };
        let cfg = prepare(event(json!({"username": "alice", "delay": 1e20})), &envd).unwrap();
        assert_eq!(cfg.delay, Duration::from_secs(3600));
    }

    #[test]
    fn response_uses_status_code_key() {
        let v = serde_json::to_value(Response::bad_request("x")).unwrap();
        assert_eq!(v["statusCode"], 400);
        assert!(v["body"].is_string());
    }

    #[tokio::test]
    async fn successful_run_reports_stats() {
        let page = json!({"data": [
            {"id": "a1", "title": "A", "canonical_path": "/listing/A-a1"},
            {"id": "b2", "title": "B", "canonical_path": "/listing/B-b2"}
        ]});
        let src = MockSource::new()
            .body("posts/filtered", page.to_string())
            .body("/listing/", "<html><body></body></html>");
        let store = MemoryStore::new().with_object("alice/a1.json", "{}");
        let cfg = prepare(event(json!({"username": "alice", "s3_bucket": "memory", "delay": 0})), &EnvDefaults::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let r = handle_with(&cfg, &src, &store, dir.path()).await;
        assert_eq!(r.status_code, 200);
        let b = body(&r);
        assert_eq!(b["success"], true);
        assert_eq!(b["stats"]["total"], 1);
        assert_eq!(b["stats"]["new"], 1);
        assert_eq!(b["stats"]["skipped"], 1);
        assert_eq!(b["stats"]["errors"], 0);
        assert_eq!(b["errors"], json!([]));
        assert!(store.get("alice/b2.json").is_some());
    }

    #[tokio::test]
    async fn item_errors_are_listed() {
        let page = json!({"data": [
            {"id": "a1", "title": "A", "canonical_path": "/listing/A-a1"},
            {"id": "b2", "title": "B", "canonical_path": "/listing/B-b2"}
        ]});
        let src = MockSource::new()
            .body("posts/filtered", page.to_string())
            .route("/listing/", vec![MockReply::Status(404)]);
        let store = MemoryStore::new().failing_put("alice/b2.json");
        let cfg = prepare(event(json!({"username": "alice", "s3_bucket": "memory", "delay": 0})), &EnvDefaults::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let r = handle_with(&cfg, &src, &store, dir.path()).await;
        assert_eq!(r.status_code, 200);
        let b = body(&r);
        assert_eq!(b["stats"]["errors"], 3);
        assert_eq!(b["stats"]["total"], 1);
        let errors = b["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.iter().filter(|e| e["stage"] == "detail").count(), 2);
        assert!(errors.iter().any(|e| e["slug"] == "b2" && e["stage"] == "remote"));
        assert!(errors.iter().all(|e| e["error"].is_string()));
    }

    #[tokio::test]
    async fn unreachable_site_is_500() {
        let src = MockSource::new().route("poshmark.com", vec![MockReply::Status(503)]);
        let store = MemoryStore::new();
        let cfg = prepare(event(json!({"username": "alice", "s3_bucket": "memory", "delay": 0})), &EnvDefaults::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let r = handle_with(&cfg, &src, &store, dir.path()).await;
        assert_eq!(r.status_code, 500);
        assert_eq!(body(&r)["success"], false);
    }
}
