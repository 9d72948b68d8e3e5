//! Output formatting and persistence for decoded feeds.
//!
//! Supports pretty-printing, JSON serialization, and CSV append of summary
//! rows.

use anyhow::Result;
use tracing::debug;

use crate::feed::FeedMessage;
use crate::stats::FeedSummary;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Renders a decoded feed as pretty-printed JSON.
pub fn render_json(feed: &FeedMessage) -> Result<String> {
    Ok(serde_json::to_string_pretty(feed)?)
}

/// Logs a decoded feed using Rust's debug pretty-print format.
pub fn print_pretty(feed: &FeedMessage) {
    debug!("{:#?}", feed);
}

/// Appends a [`FeedSummary`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summary(path: &str, summary: &FeedSummary) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{EntityContent, FeedEntity};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_render_json_includes_parse_error_marker() {
        let feed = FeedMessage {
            entities: vec![FeedEntity {
                id: "e1".to_string(),
                is_deleted: None,
                content: Some(EntityContent::ParseError("buffer underrun".to_string())),
            }],
            parse_errors: 1,
            ..Default::default()
        };
        let json = render_json(&feed).unwrap();
        assert!(json.contains("parse_error"), "{json}");
        assert!(json.contains("buffer underrun"), "{json}");
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&FeedMessage::default());
    }

    #[test]
    fn test_append_summary_creates_file() {
        let path = temp_path("gtfs_rt_decoder_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        append_summary(&path, &FeedSummary::default()).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_summary_writes_header_once() {
        let path = temp_path("gtfs_rt_decoder_test_header.csv");
        let _ = fs::remove_file(&path);

        append_summary(&path, &FeedSummary::default()).unwrap();
        append_summary(&path, &FeedSummary::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_summary_two_rows() {
        let path = temp_path("gtfs_rt_decoder_test_rows.csv");
        let _ = fs::remove_file(&path);

        append_summary(&path, &FeedSummary::default()).unwrap();
        append_summary(&path, &FeedSummary::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // 1 header + 2 data rows
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        fs::remove_file(&path).unwrap();
    }
}
