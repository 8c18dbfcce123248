use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The persisted unit: one canvas value and when it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub canvas: Value,
    pub last_updated: DateTime<Utc>,
}

impl DocumentRecord {
    /// Stamp a canvas value with the current time
    pub fn new(canvas: Value) -> Self {
        Self {
            canvas,
            last_updated: Utc::now(),
        }
    }

    /// Modification time in RFC 3339 form
    pub fn last_updated_rfc3339(&self) -> String {
        self.last_updated.to_rfc3339()
    }
}
