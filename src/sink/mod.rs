//! Output destinations: local JSON/CSV files and one remote object per listing.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ScrapeConfig;
use crate::listing::Listing;

pub mod csv;
pub mod json;
pub mod remote;
pub mod status_page;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("encoding json {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct LocalReport {
    pub json_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
}

/// Write the files `cfg.format` asks for under `dir`.
pub fn write_local(listings: &[Listing], cfg: &ScrapeConfig, dir: &Path) -> Result<LocalReport, SinkError> {
    let mut report = LocalReport::default();
    if cfg.format.wants_json() {
        let path = dir.join(format!("{}.json", cfg.output_stem));
        json::write_json(&path, listings)?;
        report.json_path = Some(path);
    }
    if cfg.format.wants_csv() {
        let path = dir.join(format!("{}.csv", cfg.output_stem));
        if csv::write_csv(&path, listings)? {
            report.csv_path = Some(path);
        }
    }
    Ok(report)
}
