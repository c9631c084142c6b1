//! Order sequence counter document

use serde::{Deserialize, Serialize};

use crate::types::IsoTimestamp;

/// Document id of the counter under `rooms/{room}/meta/`
pub const COUNTER_DOC: &str = "orderSeq";

/// `rooms/{room}/meta/orderSeq`
///
/// `n` is the next number to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCounter {
    #[serde(default = "first_number")]
    pub n: u64,
    #[serde(default)]
    pub updated_at: IsoTimestamp,
}

fn first_number() -> u64 {
    1
}

impl SequenceCounter {
    /// Number to issue from this counter; a stored `0` counts as the first
    pub fn next_number(&self) -> u64 {
        self.n.max(first_number())
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self {
            n: first_number(),
            updated_at: IsoTimestamp::new(),
        }
    }
}
