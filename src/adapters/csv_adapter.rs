//! CSV file kline adapter.
//!
//! Reads a long-format panel (one row per kline, any number of series) with a
//! header row. Extra columns are ignored; missing required ones are fatal.

use crate::domain::error::KlineTraderError;
use crate::domain::kline::{RawKline, validate_columns};
use crate::ports::data_port::KlineSource;
use std::path::PathBuf;

pub struct CsvKlineAdapter {
    path: PathBuf,
}

impl CsvKlineAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_error(&self, reason: impl ToString) -> KlineTraderError {
        KlineTraderError::DataRead {
            source_name: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl KlineSource for CsvKlineAdapter {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, KlineTraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.read_error(e))?;

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| self.read_error(e))?
            .iter()
            .map(str::to_string)
            .collect();
        validate_columns(&headers)?;

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize::<RawKline>().enumerate() {
            let record = result.map_err(|e| self.read_error(format!("row {}: {}", line + 2, e)))?;
            records.push(record);
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
