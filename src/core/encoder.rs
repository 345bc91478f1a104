//! Push payload encoding
//!
//! Turns a drained sequence of records into the JSON body of a Loki push
//! request:
//!
//! ```json
//! {"streams":[{"stream":{"job":"api","level":"info"},
//!              "values":[["1736332245123456000","[main.rs:4] started"]]}]}
//! ```
//!
//! Records are grouped by label set. Streams appear in the order their
//! label set was first seen, and lines keep enqueue order within a stream.
//! Encoding is pure: the same input always yields the same bytes.

use super::error::Result;
use super::labels::LabelSet;
use super::record::Record;
use super::timestamp::epoch_nanos;
use serde::Serialize;
use std::collections::HashMap;

/// One stream of a push request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamBatch<'a> {
    pub stream: &'a LabelSet,
    /// `[epoch-nanoseconds, line]` pairs in enqueue order
    pub values: Vec<[String; 2]>,
}

/// Records of one flush grouped by label set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch<'a> {
    streams: Vec<StreamBatch<'a>>,
}

impl<'a> Batch<'a> {
    /// Group records by label set
    ///
    /// Fails with an encoding error when a record's timestamp cannot be
    /// expressed in epoch nanoseconds.
    pub fn from_records(records: &'a [Record]) -> Result<Self> {
        let mut streams: Vec<StreamBatch<'a>> = Vec::new();
        let mut index: HashMap<&'a LabelSet, usize> = HashMap::new();

        for record in records {
            let pair = [epoch_nanos(record.timestamp())?.to_string(), record.line()];
            match index.get(record.labels()) {
                Some(&slot) => streams[slot].values.push(pair),
                None => {
                    index.insert(record.labels(), streams.len());
                    streams.push(StreamBatch {
                        stream: record.labels(),
                        values: vec![pair],
                    });
                }
            }
        }

        Ok(Self { streams })
    }

    pub fn streams(&self) -> &[StreamBatch<'a>] {
        &self.streams
    }

    pub fn record_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Encode records straight into a push request body
pub fn encode(records: &[Record]) -> Result<Vec<u8>> {
    Batch::from_records(records)?.to_json()
}
