use std::env;
use std::time::Duration;

use crate::util::time::delay_from_secs;

pub const DEFAULT_BASE_URL: &str = "https://poshmark.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_PAGES: usize = 200;
/// Listings requested per closet page.
pub const PAGE_SIZE: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FileFormat {
    Json,
    Csv,
    Both,
}

impl FileFormat {
    pub fn wants_json(self) -> bool { matches!(self, FileFormat::Json | FileFormat::Both) }
    pub fn wants_csv(self) -> bool { matches!(self, FileFormat::Csv | FileFormat::Both) }
}

/// Remote sink location. Present only when a bucket was configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteTarget {
    pub bucket: String,
    pub prefix: String,
}

impl RemoteTarget {
    pub fn key_for(&self, slug: &str) -> String {
        format!("{}/{}.json", self.prefix, slug)
    }
}

/// Fully resolved settings for one scrape run.
#[derive(Clone, Debug)]
pub struct ScrapeConfig {
    pub username: String,
    pub base_url: String,
    pub timeout: Duration,
    pub delay: Duration,
    pub max_pages: usize,
    pub visit_details: bool,
    pub incremental: bool,
    pub remote: Option<RemoteTarget>,
    pub remote_only: bool,
    pub format: FileFormat,
    pub output_stem: String,
}

/// Raw, partially-specified inputs as given on the command line or in an event.
#[derive(Clone, Debug, Default)]
pub struct ScrapeInputs {
    pub username: String,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub delay_secs: Option<f64>,
    pub max_pages: Option<usize>,
    pub visit_details: Option<bool>,
    pub incremental: Option<bool>,
    pub remote_only: bool,
    pub format: Option<FileFormat>,
    pub output: Option<String>,
}

/// Environment values that may fill in unset inputs.
#[derive(Clone, Debug, Default)]
pub struct EnvDefaults {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        EnvDefaults {
            bucket: non_empty(env::var("S3_BUCKET").ok()),
            prefix: non_empty(env::var("S3_PREFIX").ok()),
            base_url: non_empty(env::var("CLOSET_BASE_URL").ok()),
            timeout_secs: env::var("CLOSET_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()),
        }
    }
}

impl ScrapeConfig {
    pub fn resolve(inputs: ScrapeInputs, envd: &EnvDefaults, default_delay: f64) -> Self {
        let username = inputs.username.trim().to_string();
        let bucket = non_empty(inputs.bucket).or_else(|| envd.bucket.clone());
        let remote = bucket.map(|bucket| {
            let prefix = non_empty(inputs.prefix)
                .or_else(|| envd.prefix.clone())
                .unwrap_or_else(|| username.clone());
            RemoteTarget { bucket, prefix: prefix.trim_matches('/').to_string() }
        });
        let output_stem = non_empty(inputs.output).unwrap_or_else(|| format!("{}_listings", username));

        ScrapeConfig {
            base_url: envd.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()).trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(envd.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            delay: delay_from_secs(inputs.delay_secs.unwrap_or(default_delay)),
            max_pages: inputs.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            visit_details: inputs.visit_details.unwrap_or(true),
            incremental: inputs.incremental.unwrap_or(true),
            remote_only: inputs.remote_only,
            format: inputs.format.unwrap_or(FileFormat::Json),
            remote,
            output_stem,
            username,
        }
    }

    pub fn writes_local(&self) -> bool {
        !(self.remote_only && self.remote.is_some())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(user: &str) -> ScrapeInputs {
        ScrapeInputs { username: user.into(), ..Default::default() }
    }

    #[test]
    fn prefix_defaults_to_username() {
        let mut i = inputs("alice");
        i.bucket = Some("b".into());
        let cfg = ScrapeConfig::resolve(i, &EnvDefaults::default(), 2.0);
        let remote = cfg.remote.unwrap();
        assert_eq!(remote.prefix, "alice");
        assert_eq!(remote.key_for("abc"), "alice/abc.json");
    }

    #[test]
    fn env_supplies_bucket_and_prefix() {
        let envd = EnvDefaults { bucket: Some("env-b".into()), prefix: Some("backups/alice/".into()), ..Default::default() };
        let cfg = ScrapeConfig::resolve(inputs("alice"), &envd, 2.0);
        assert_eq!(cfg.remote, Some(RemoteTarget { bucket: "env-b".into(), prefix: "backups/alice".into() }));
    }

    #[test]
    fn explicit_values_beat_env() {
        let envd = EnvDefaults { bucket: Some("env-b".into()), prefix: Some("p".into()), ..Default::default() };
        let mut i = inputs("alice");
        i.bucket = Some("cli-b".into());
        i.prefix = Some("mine".into());
        let cfg = ScrapeConfig::resolve(i, &envd, 2.0);
        assert_eq!(cfg.remote, Some(RemoteTarget { bucket: "cli-b".into(), prefix: "mine".into() }));
    }

    #[test]
    fn defaults() {
        let cfg = ScrapeConfig::resolve(inputs("bob"), &EnvDefaults::default(), 2.0);
        assert!(cfg.remote.is_none());
        assert!(cfg.incremental);
        assert!(cfg.visit_details);
        assert_eq!(cfg.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(cfg.delay, Duration::from_secs(2));
        assert_eq!(cfg.output_stem, "bob_listings");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert!(cfg.writes_local());
    }

    #[test]
    fn remote_only_without_bucket_still_writes_local() {
        let mut i = inputs("bob");
        i.remote_only = true;
        let cfg = ScrapeConfig::resolve(i, &EnvDefaults::default(), 2.0);
        assert!(cfg.writes_local());
    }
}
