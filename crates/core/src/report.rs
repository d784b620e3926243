//! Result report rendering.
//!
//! Once a job is terminal, its outcome is exported as a CSV mirroring
//! the input format plus an `Output Image Urls` column. Rendering is a
//! pure function of the assembled rows so regenerating a report for
//! unchanged data is byte-identical.

use crate::error::CoreError;
use crate::intake::{COLUMN_INPUT_URLS, COLUMN_NAME, COLUMN_SERIAL};

/// Output column appended to the three input columns.
pub const COLUMN_OUTPUT_URLS: &str = "Output Image Urls";

/// One product's worth of report data, assembled by the storage layer.
///
/// `output_urls` is aligned index-for-index with `input_urls`; a unit
/// without a successful output contributes `None`.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub serial_number: i64,
    pub product_name: String,
    pub input_urls: Vec<String>,
    pub output_urls: Vec<Option<String>>,
}

/// Render report rows as CSV bytes.
///
/// Rows must already be ordered by serial number (the storage layer
/// orders them); rendering preserves the given order. Units without an
/// output URL appear as empty strings in the joined output column.
pub fn render_report(rows: &[ReportRow]) -> Result<String, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([COLUMN_SERIAL, COLUMN_NAME, COLUMN_INPUT_URLS, COLUMN_OUTPUT_URLS])
        .map_err(|e| CoreError::Internal(format!("report write failed: {e}")))?;

    for row in rows {
        let inputs = row.input_urls.join(",");
        let outputs = row
            .output_urls
            .iter()
            .map(|u| u.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(",");
        writer
            .write_record([
                row.serial_number.to_string().as_str(),
                row.product_name.as_str(),
                inputs.as_str(),
                outputs.as_str(),
            ])
            .map_err(|e| CoreError::Internal(format!("report write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("report flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Internal(format!("report not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<ReportRow> {
        vec![
            ReportRow {
                serial_number: 1,
                product_name: "Widget".to_string(),
                input_urls: vec!["in/a.jpg".to_string(), "in/b.jpg".to_string()],
                output_urls: vec![Some("out/a.jpg".to_string()), Some("out/b.jpg".to_string())],
            },
            ReportRow {
                serial_number: 2,
                product_name: "Gadget".to_string(),
                input_urls: vec!["in/c.jpg".to_string()],
                output_urls: vec![None],
            },
        ]
    }

    #[test]
    fn renders_header_and_rows() {
        let csv = render_report(&sample_rows()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "S. No.,Product Name,Input Image Urls,Output Image Urls"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,Widget,\"in/a.jpg,in/b.jpg\",\"out/a.jpg,out/b.jpg\""
        );
        // A unit without output yields an empty string in the joined column.
        assert_eq!(lines.next().unwrap(), "2,Gadget,in/c.jpg,");
        assert!(lines.next().is_none());
    }

    #[test]
    fn rendering_is_byte_identical_on_reinvocation() {
        let rows = sample_rows();
        let first = render_report(&rows).unwrap();
        let second = render_report(&rows).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_report_has_header_only() {
        let csv = render_report(&[]).unwrap();
        assert_eq!(
            csv,
            "S. No.,Product Name,Input Image Urls,Output Image Urls\n"
        );
    }

    #[test]
    fn mixed_outcomes_keep_alignment() {
        let rows = vec![ReportRow {
            serial_number: 5,
            product_name: "Mixed".to_string(),
            input_urls: vec!["in/1.jpg".to_string(), "in/2.jpg".to_string(), "in/3.jpg".to_string()],
            output_urls: vec![Some("out/1.jpg".to_string()), None, Some("out/3.jpg".to_string())],
        }];
        let csv = render_report(&rows).unwrap();
        assert!(csv.contains("\"out/1.jpg,,out/3.jpg\""));
    }
}
