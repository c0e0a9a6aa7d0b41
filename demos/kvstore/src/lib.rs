//! Shared wire types for the kvstore demo binaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored entry: when it was captured and what it says.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub ts: DateTime<Utc>,
    pub value: String,
}
