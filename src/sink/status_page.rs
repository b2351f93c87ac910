use crate::config::RemoteTarget;
use crate::dedup::load_known_slugs;
use crate::store::{ObjectStore, PutOptions};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase as ScrapePhase, Scrape};

/// Figures shown on the public backup status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPage {
    pub closet: String,
    pub total: usize,
    pub written: usize,
    pub new: usize,
    pub updated_at: String,
}

impl StatusPage {
    pub fn render(&self) -> String {
        let closet = escape(&self.closet);
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Closet backup: {closet}</title>
<style>
body {{ font-family: system-ui, sans-serif; background: #f4f4f8; display: flex; justify-content: center; padding: 40px 16px; }}
main {{ background: #fff; border-radius: 12px; padding: 32px; max-width: 560px; width: 100%; box-shadow: 0 8px 24px rgba(0,0,0,.12); }}
.stats {{ display: grid; grid-template-columns: repeat(3, 1fr); gap: 12px; margin: 24px 0; }}
.stat {{ background: #7f3b8b; color: #fff; border-radius: 10px; padding: 16px; text-align: center; }}
.value {{ font-size: 2em; font-weight: 700; }}
.label {{ font-size: .8em; text-transform: uppercase; letter-spacing: 1px; }}
</style>
</head>
<body>
<main>
<h1>Closet backup</h1>
<p>Closet: <strong>{closet}</strong></p>
<div class="stats">
<div class="stat"><div class="value" id="total">{total}</div><div class="label">Total listings</div></div>
<div class="stat"><div class="value" id="written">{written}</div><div class="label">Backed up this run</div></div>
<div class="stat"><div class="value" id="new">{new}</div><div class="label">New</div></div>
</div>
<p>Last backup: <time id="updated">{updated}</time></p>
</main>
</body>
</html>
"#,
            closet = closet,
            total = self.total,
            written = self.written,
            new = self.new,
            updated = escape(&self.updated_at),
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Re-count stored listings and upload `{prefix}/index.html` as public-read.
/// Failures are logged; returns whether the page was stored.
pub async fn publish(
    store: &dyn ObjectStore,
    target: &RemoteTarget,
    closet: &str,
    written: usize,
    new: usize,
    updated_at: String,
    log: &LogCtx<Scrape>,
) -> bool {
    let _g = log.span(&ScrapePhase::StatusPage).entered();
    let total = match load_known_slugs(store, &target.prefix).await {
        Ok(known) => known.len(),
        Err(e) => {
            log.warn_kv("⚠️ could not recount stored listings", [("error", e.to_string())]);
            return false;
        }
    };
    let page = StatusPage { closet: closet.to_string(), total, written, new, updated_at };
    let key = format!("{}/index.html", target.prefix);
    match store.put(&key, page.render().into_bytes(), PutOptions::PUBLIC_HTML).await {
        Ok(()) => {
            log.info_kv("✅ status page uploaded", [("key", format!("s3://{}/{}", store.bucket(), key))]);
            true
        }
        Err(e) => {
            log.warn_kv("⚠️ status page upload failed", [("error", e.to_string())]);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::telemetry;

    #[test]
    fn render_shows_counts_and_escapes() {
        let page = StatusPage { closet: "a<b>".into(), total: 12, written: 3, new: 2, updated_at: "2025-01-02 03:04:05 UTC".into() };
        let html = page.render();
        assert!(html.contains("a&lt;b&gt;"));
        assert!(!html.contains("a<b>"));
        assert!(html.contains(r#"<div class="value" id="total">12</div>"#));
        assert!(html.contains(r#"id="written">3<"#));
        assert!(html.contains(r#"id="new">2<"#));
        assert!(html.contains("2025-01-02 03:04:05 UTC"));
    }

    #[tokio::test]
    async fn publish_counts_stored_listings() {
        let store = MemoryStore::new().with_object("alice/a1.json", "{}").with_object("alice/b2.json", "{}");
        let target = RemoteTarget { bucket: "memory".into(), prefix: "alice".into() };
        assert!(publish(&store, &target, "alice", 1, 1, "now".into(), &telemetry::scrape()).await);
        let html = store.get("alice/index.html").unwrap();
        assert!(html.contains(r#"id="total">2<"#));
        assert_eq!(store.options("alice/index.html"), Some(PutOptions::PUBLIC_HTML));
    }

    #[tokio::test]
    async fn upload_failure_is_not_fatal() {
        let store = MemoryStore::new().failing_put("alice/index.html");
        let target = RemoteTarget { bucket: "memory".into(), prefix: "alice".into() };
        assert!(!publish(&store, &target, "alice", 0, 0, "now".into(), &telemetry::scrape()).await);
    }
}
