//! Batch intake: decode and validate the uploaded CSV.
//!
//! A batch file has one product per row with three required columns:
//! a serial number, a product name, and a comma-separated list of input
//! image URLs (the URL list is a single quoted CSV cell). Validation is
//! all-or-nothing: any row error invalidates the whole batch and no
//! state is created.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Required column headers, in canonical output order.
pub const COLUMN_SERIAL: &str = "S. No.";
pub const COLUMN_NAME: &str = "Product Name";
pub const COLUMN_INPUT_URLS: &str = "Input Image Urls";

const REQUIRED_COLUMNS: [&str; 3] = [COLUMN_SERIAL, COLUMN_NAME, COLUMN_INPUT_URLS];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One validated row of the batch: a product and its image URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    /// Serial number verbatim from the input. Not necessarily unique
    /// or contiguous.
    pub serial_number: i64,
    /// Non-empty product name.
    pub product_name: String,
    /// Trimmed, non-empty image URLs in input order. Never empty.
    pub image_urls: Vec<String>,
}

/// The successful outcome of intake validation.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    /// Rows in input order.
    pub rows: Vec<BatchRow>,
    /// Total unit count across all rows. Frozen into the job at
    /// decomposition time.
    pub total_units: i32,
}

/// A single row-level validation defect, reported with its 1-based
/// data-row index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Why a batch was rejected.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The input could not be decoded as CSV at all.
    #[error("Could not read batch file: {0}")]
    Malformed(#[from] csv::Error),

    /// One or more required columns are absent. Reported without
    /// scanning any rows.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// One or more rows failed validation. The whole batch is rejected.
    #[error("{} invalid row(s) in batch", .0.len())]
    InvalidRows(Vec<RowError>),
}

impl IntakeError {
    /// Flatten into human-readable messages for API error responses.
    pub fn details(&self) -> Vec<String> {
        match self {
            IntakeError::Malformed(e) => vec![e.to_string()],
            IntakeError::MissingColumns(_) => vec![self.to_string()],
            IntakeError::InvalidRows(rows) => rows.iter().map(|r| r.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Decode and validate raw batch bytes.
///
/// Returns the validated rows plus the declared unit count, or the
/// complete list of defects. Never partially succeeds and has no side
/// effects.
pub fn parse_batch(input: &[u8]) -> Result<ValidatedBatch, IntakeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    // Structural check first: a missing column fails immediately with a
    // single error naming every absent column, before any row is read.
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IntakeError::MissingColumns(missing));
    }

    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .expect("presence checked above")
    };
    let serial_idx = col(COLUMN_SERIAL);
    let name_idx = col(COLUMN_NAME);
    let urls_idx = col(COLUMN_INPUT_URLS);

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut total_units: i32 = 0;

    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                errors.push(RowError {
                    row,
                    message: format!("unreadable row: {e}"),
                });
                continue;
            }
        };

        let serial_raw = record.get(serial_idx).unwrap_or("");
        let name = record.get(name_idx).unwrap_or("");
        let urls_raw = record.get(urls_idx).unwrap_or("");

        if serial_raw.is_empty() || name.is_empty() || urls_raw.is_empty() {
            errors.push(RowError {
                row,
                message: "empty required field".to_string(),
            });
            continue;
        }

        let serial_number: i64 = match serial_raw.parse() {
            Ok(n) => n,
            Err(_) => {
                errors.push(RowError {
                    row,
                    message: format!("invalid serial number \"{serial_raw}\""),
                });
                continue;
            }
        };

        let image_urls: Vec<String> = urls_raw
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if image_urls.is_empty() {
            errors.push(RowError {
                row,
                message: "no image URLs".to_string(),
            });
            continue;
        }

        total_units += image_urls.len() as i32;
        rows.push(BatchRow {
            serial_number,
            product_name: name.to_string(),
            image_urls,
        });
    }

    if !errors.is_empty() {
        return Err(IntakeError::InvalidRows(errors));
    }

    Ok(ValidatedBatch { rows, total_units })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "\
S. No.,Product Name,Input Image Urls
1,Widget,\"https://img.example/a.jpg, https://img.example/b.jpg\"
2,Gadget,https://img.example/c.jpg
";

    #[test]
    fn valid_batch_parses_with_unit_count() {
        let batch = parse_batch(VALID.as_bytes()).expect("batch should be valid");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.total_units, 3);
        assert_eq!(batch.rows[0].serial_number, 1);
        assert_eq!(batch.rows[0].product_name, "Widget");
        assert_eq!(
            batch.rows[0].image_urls,
            vec!["https://img.example/a.jpg", "https://img.example/b.jpg"]
        );
        assert_eq!(batch.rows[1].image_urls.len(), 1);
    }

    #[test]
    fn quoted_url_list_is_one_cell() {
        let batch = parse_batch(VALID.as_bytes()).unwrap();
        // The quoted comma-separated list must not bleed into other columns.
        assert_eq!(batch.rows[0].image_urls.len(), 2);
    }

    #[test]
    fn missing_columns_fail_without_row_scan() {
        let input = "S. No.,Product Name\n1,Widget\nnot-a-serial,\n";
        let err = parse_batch(input.as_bytes()).unwrap_err();
        match err {
            IntakeError::MissingColumns(cols) => {
                assert_eq!(cols, vec![COLUMN_INPUT_URLS.to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn missing_columns_reported_together() {
        let input = "Product Name\nWidget\n";
        let err = parse_batch(input.as_bytes()).unwrap_err();
        match err {
            IntakeError::MissingColumns(cols) => {
                assert_eq!(
                    cols,
                    vec![COLUMN_SERIAL.to_string(), COLUMN_INPUT_URLS.to_string()]
                );
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn bad_serial_reported_with_one_based_index() {
        let input = "\
S. No.,Product Name,Input Image Urls
1,Widget,https://img.example/a.jpg
x,Gadget,https://img.example/b.jpg
";
        let err = parse_batch(input.as_bytes()).unwrap_err();
        match err {
            IntakeError::InvalidRows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].row, 2);
                assert!(rows[0].message.contains("serial"));
            }
            other => panic!("expected InvalidRows, got {other:?}"),
        }
    }

    #[test]
    fn empty_fields_and_empty_url_list_accumulate() {
        let input = "\
S. No.,Product Name,Input Image Urls
1,,https://img.example/a.jpg
2,Gadget,\" , \"
3,Widget,https://img.example/b.jpg
";
        let err = parse_batch(input.as_bytes()).unwrap_err();
        match err {
            IntakeError::InvalidRows(rows) => {
                let indices: Vec<usize> = rows.iter().map(|r| r.row).collect();
                assert_eq!(indices, vec![1, 2]);
            }
            other => panic!("expected InvalidRows, got {other:?}"),
        }
    }

    #[test]
    fn any_row_error_rejects_the_whole_batch() {
        let input = "\
S. No.,Product Name,Input Image Urls
1,Widget,https://img.example/a.jpg
oops,Gadget,https://img.example/b.jpg
";
        assert!(parse_batch(input.as_bytes()).is_err());
    }

    #[test]
    fn duplicate_serials_are_allowed() {
        let input = "\
S. No.,Product Name,Input Image Urls
7,Widget,https://img.example/a.jpg
7,Gadget,https://img.example/b.jpg
";
        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch.rows[0].serial_number, 7);
        assert_eq!(batch.rows[1].serial_number, 7);
    }

    #[test]
    fn empty_file_is_a_structural_error() {
        let err = parse_batch(b"").unwrap_err();
        assert!(matches!(err, IntakeError::MissingColumns(_)));
    }

    #[test]
    fn headers_only_yields_zero_units() {
        let input = "S. No.,Product Name,Input Image Urls\n";
        let batch = parse_batch(input.as_bytes()).unwrap();
        assert!(batch.rows.is_empty());
        assert_eq!(batch.total_units, 0);
    }
}
