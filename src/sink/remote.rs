use serde::Serialize;

use crate::config::RemoteTarget;
use crate::dedup::KnownSlugs;
use crate::listing::Listing;
use crate::store::{ObjectStore, PutOptions};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;

use super::json::listing_bytes;

#[derive(Debug, Default, Serialize)]
pub struct RemoteReport {
    pub written: usize,
    pub new: usize,
    pub updated: usize,
    /// `(slug, reason)` for every object that could not be stored.
    pub failures: Vec<(String, String)>,
}

/// Put each listing at `{prefix}/{slug}.json`. A failed put is recorded and
/// the remaining listings are still written.
pub async fn write_remote(
    store: &dyn ObjectStore,
    target: &RemoteTarget,
    listings: &[Listing],
    known: &KnownSlugs,
    log: &LogCtx<Scrape>,
) -> RemoteReport {
    let mut report = RemoteReport::default();
    for l in listings {
        let key = target.key_for(&l.slug);
        let body = match listing_bytes(l) {
            Ok(b) => b,
            Err(e) => {
                report.failures.push((l.slug.clone(), e.to_string()));
                continue;
            }
        };
        match store.put(&key, body, PutOptions::JSON).await {
            Ok(()) => {
                report.written += 1;
                if known.contains(&l.slug) { report.updated += 1 } else { report.new += 1 }
                log.debug(format!("☁️ stored s3://{}/{}", store.bucket(), key));
            }
            Err(e) => {
                log.warn_kv("⚠️ remote write failed", [("slug", l.slug.clone()), ("error", e.to_string())]);
                report.failures.push((l.slug.clone(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::telemetry;

    fn target() -> RemoteTarget {
        RemoteTarget { bucket: "memory".into(), prefix: "alice".into() }
    }

    fn listing(slug: &str) -> Listing {
        let mut l = Listing::from_link(format!("https://poshmark.com/listing/Item-{slug}"));
        l.title = format!("Item {slug}");
        l
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_writes() {
        let store = MemoryStore::new().failing_put("alice/0002.json");
        let listings = vec![listing("0001"), listing("0002"), listing("0003")];
        let known: KnownSlugs = ["0003".to_string()].into_iter().collect();
        let r = write_remote(&store, &target(), &listings, &known, &telemetry::scrape()).await;

        assert_eq!(r.written, 2);
        assert_eq!(r.new, 1);
        assert_eq!(r.updated, 1);
        assert_eq!(r.failures.len(), 1);
        assert_eq!(r.failures[0].0, "0002");
        assert!(store.get("alice/0003.json").is_some());
        assert_eq!(store.options("alice/0001.json"), Some(PutOptions::JSON));
    }

    #[tokio::test]
    async fn stored_object_is_the_listing() {
        let store = MemoryStore::new();
        let l = listing("0001");
        write_remote(&store, &target(), std::slice::from_ref(&l), &KnownSlugs::new(), &telemetry::scrape()).await;
        let back: Listing = serde_json::from_str(&store.get("alice/0001.json").unwrap()).unwrap();
        assert_eq!(back, l);
    }
}
