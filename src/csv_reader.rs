use crate::error::{DataError, Result};
use std::io::Read;

/// Raw CSV contents: header row plus data rows, all as text.
#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read CSV data from any reader. The first record is the header row.
/// A header-only input yields zero rows.
pub fn read_csv<R: Read>(reader: R) -> Result<CsvData> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| DataError::InvalidInput(format!("failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DataError::InvalidInput("CSV has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record
            .map_err(|e| DataError::InvalidInput(format!("failed to read CSV row {}: {}", i + 1, e)))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(CsvData { headers, rows })
}
