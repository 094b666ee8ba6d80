use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::persist::{ensure_output_dir, parent_dir, PersistError};
use crate::types::Record;

/// Spreadsheet tools need the BOM to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("result schema has no columns")]
    EmptySchema,
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error on result file: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only CSV result file.
///
/// The header is written once, when the file is new, empty or replaced. Every row is
/// flushed and synced before `append_row` returns, so a crash loses at most
/// the row in flight.
pub struct ResultSink {
    path: PathBuf,
    schema: Vec<String>,
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl ResultSink {
    /// Starts a fresh result file, replacing whatever a previous job left at `path`.
    pub fn create(path: &Path, schema: Vec<String>) -> Result<Self, SinkError> {
        Self::start(path, schema, true)
    }

    /// Appends to an existing result file; the header is only written if it is empty.
    pub fn open(path: &Path, schema: Vec<String>) -> Result<Self, SinkError> {
        Self::start(path, schema, false)
    }

    fn start(path: &Path, schema: Vec<String>, truncate: bool) -> Result<Self, SinkError> {
        if schema.is_empty() {
            return Err(SinkError::EmptySchema);
        }
        ensure_output_dir(&parent_dir(path))?;

        let mut options = OpenOptions::new();
        if truncate {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let mut file = options.open(path)?;
        let is_new = file.metadata()?.len() == 0;
        if is_new {
            file.write_all(UTF8_BOM)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(&schema)?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            rows_written: 0,
        })
    }

    pub fn append_row(&mut self, record: &Record) -> Result<(), SinkError> {
        self.writer.write_record(record.values_for(&self.schema))?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// Rows appended through this handle, not counting earlier runs.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}
