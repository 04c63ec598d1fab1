// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `stream logs` (§6): a VM posts either one log line or a batch. Parsed
//! into a closed sum type up front rather than probing an ad-hoc JSON body
//! for which shape showed up (§9 redesign note).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SingleLogLine {
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchLogLines {
    pub logs: Vec<SingleLogLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamLogsRequest {
    Batch(BatchLogLines),
    Single(SingleLogLine),
}

impl StreamLogsRequest {
    /// Flatten either shape into the list of lines it carries.
    pub fn into_lines(self) -> Vec<SingleLogLine> {
        match self {
            StreamLogsRequest::Batch(b) => b.logs,
            StreamLogsRequest::Single(s) => vec![s],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamLogsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_log_line() {
        let body = serde_json::json!({"level": "info", "message": "hi"});
        let req: StreamLogsRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.into_lines().len(), 1);
    }

    #[test]
    fn parses_a_batch() {
        let body = serde_json::json!({"logs": [
            {"level": "info", "message": "a"},
            {"level": "warn", "message": "b"}
        ]});
        let req: StreamLogsRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.into_lines().len(), 2);
    }
}
