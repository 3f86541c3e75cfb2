//! CSV export of listing records.

use crate::marketplace::{ListingRecord, Marketplace};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Output file creation and write failures.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Failed to write output file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
}

/// Output text encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-8 with a byte-order mark, for spreadsheet tools.
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(Encoding::Utf8Sig),
            _ => Err(format!("Unsupported encoding: {}. Use: utf-8, utf-8-sig", s)),
        }
    }
}

/// Destination for extracted records.
pub trait RecordSink {
    fn emit(&mut self, record: &ListingRecord) -> Result<(), EmitError>;
}

impl RecordSink for Vec<ListingRecord> {
    fn emit(&mut self, record: &ListingRecord) -> Result<(), EmitError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes records to a timestamped CSV file.
pub struct CsvEmitter {
    writer: csv::Writer<File>,
    marketplace: Marketplace,
    path: PathBuf,
    rows: usize,
}

impl CsvEmitter {
    /// Output file name: `<YYYY_MM_DD__HH_MM><suffix>.csv`.
    pub fn file_name(marketplace: Marketplace, now: DateTime<Local>) -> String {
        format!("{}{}.csv", now.format("%Y_%m_%d__%H_%M"), marketplace.feed_suffix())
    }

    /// Creates the output file in `dir` and writes the header row.
    pub fn create(
        dir: &Path,
        marketplace: Marketplace,
        encoding: Encoding,
    ) -> Result<Self, EmitError> {
        let path = dir.join(Self::file_name(marketplace, Local::now()));
        Self::create_at(path, marketplace, encoding)
    }

    /// Creates the output file at an explicit path.
    pub fn create_at(
        path: PathBuf,
        marketplace: Marketplace,
        encoding: Encoding,
    ) -> Result<Self, EmitError> {
        let io_error = |source| EmitError::Io { path: path.clone(), source };

        let mut file = File::create(&path).map_err(io_error)?;
        if encoding == Encoding::Utf8Sig {
            file.write_all(UTF8_BOM).map_err(io_error)?;
        }

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(marketplace.columns())?;
        debug!("Writing {} records to {}", marketplace, path.display());

        Ok(Self { writer, marketplace, path, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes the file and returns its path.
    pub fn finish(mut self) -> Result<PathBuf, EmitError> {
        self.writer.flush().map_err(|source| EmitError::Io { path: self.path.clone(), source })?;
        info!("Stored csv feed ({} items) in: {}", self.rows, self.path.display());
        Ok(self.path)
    }
}

impl RecordSink for CsvEmitter {
    fn emit(&mut self, record: &ListingRecord) -> Result<(), EmitError> {
        self.writer.write_record(record.row(self.marketplace))?;
        self.rows += 1;
        Ok(())
    }
}
