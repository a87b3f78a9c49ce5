//! # Row Processing
//!
//! Commands emit rows into a [`RowSink`]. Handlers either collect the rows
//! and serialize them in one go, or forward them through a bounded channel to
//! a response body that renders each row as it arrives.

pub mod format;
pub mod formatters;

pub use format::OutputFormat;
pub use formatters::{cell_text, columns_of, escape_html, html_row, html_header_row, write_rows, write_rows_with_columns};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::commands::CommandError;
use crate::layers::OutputSettings;

/// One row of command output
pub type Row = IndexMap<String, Value>;

/// Capacity of the channel between a running command and a streaming response
pub const ROW_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("could not determine output format for '{0}'")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Destination for rows emitted by a command
#[async_trait]
pub trait RowSink: Send {
    async fn add_row(&mut self, row: Row) -> Result<(), CommandError>;
}

/// Column selection from the `fields` and `filter` output settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub fields: Vec<String>,
    pub filter: Vec<String>,
}

impl RowFilter {
    pub fn from_settings(settings: &OutputSettings) -> Self {
        Self {
            fields: settings.fields.clone(),
            filter: settings.filter.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.filter.is_empty()
    }

    pub fn apply(&self, mut row: Row) -> Row {
        if !self.fields.is_empty() {
            row = self
                .fields
                .iter()
                .filter_map(|f| row.shift_remove(f).map(|v| (f.clone(), v)))
                .collect();
        }
        if !self.filter.is_empty() {
            row.retain(|k, _| !self.filter.contains(k));
        }
        row
    }
}

/// Keeps every row in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    filter: RowFilter,
    rows: Vec<Row>,
}

impl CollectingSink {
    pub fn new(filter: RowFilter) -> Self {
        Self {
            filter,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[async_trait]
impl RowSink for CollectingSink {
    async fn add_row(&mut self, row: Row) -> Result<(), CommandError> {
        self.rows.push(self.filter.apply(row));
        Ok(())
    }
}

/// Forwards rows to a bounded channel. Fails once the receiver is gone,
/// which stops the command.
#[derive(Debug)]
pub struct ChannelSink {
    filter: RowFilter,
    tx: mpsc::Sender<Row>,
}

impl ChannelSink {
    pub fn new(filter: RowFilter, tx: mpsc::Sender<Row>) -> Self {
        Self { filter, tx }
    }

    /// A sink and the receiving end of its channel
    pub fn channel(filter: RowFilter) -> (Self, mpsc::Receiver<Row>) {
        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        (Self::new(filter, tx), rx)
    }
}

#[async_trait]
impl RowSink for ChannelSink {
    async fn add_row(&mut self, row: Row) -> Result<(), CommandError> {
        self.tx
            .send(self.filter.apply(row))
            .await
            .map_err(|_| CommandError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_row_filter_fields_and_filter() {
        let input = row(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);

        let fields = RowFilter {
            fields: vec!["c".into(), "a".into(), "missing".into()],
            filter: vec![],
        };
        let out = fields.apply(input.clone());
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["c", "a"]);

        let drop = RowFilter {
            fields: vec![],
            filter: vec!["b".into()],
        };
        let out = drop.apply(input);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let mut sink = CollectingSink::new(RowFilter::default());
        sink.add_row(row(&[("a", json!(1))])).await.unwrap();
        sink.add_row(row(&[("a", json!(2))])).await.unwrap();
        assert_eq!(sink.into_rows().len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_closed_receiver() {
        let (mut sink, rx) = ChannelSink::channel(RowFilter::default());
        sink.add_row(row(&[("a", json!(1))])).await.unwrap();
        drop(rx);
        let err = sink.add_row(row(&[("a", json!(2))])).await.unwrap_err();
        assert!(matches!(err, CommandError::SinkClosed));
    }
}
