//! Client-side job history and status polling for the CAGECAT web service.
//!
//! [`ledger::JobLedger`] keeps a bounded local record of submitted jobs,
//! [`poller`] drives the server status and per-job stage loops, and both
//! write through a [`sink::RenderSink`].

pub mod config;
pub mod error;
pub mod ledger;
pub mod poller;
pub mod sink;
pub mod store;
pub mod validate;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Separator between the four fields of a stored job record.
pub const FIELD_SEPARATOR: char = ';';

/// One locally remembered job submission.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: String,
    pub job_type: String,
    pub submitted_at: String,
    pub title: String,
}

impl JobRecord {
    pub fn new(id: String, job_type: String, submitted_at: String, title: String) -> Self {
        Self {
            id,
            job_type,
            submitted_at,
            title,
        }
    }

    /// `id;job_type;submitted_at;title`
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.id,
            self.job_type,
            self.submitted_at,
            self.title,
            sep = FIELD_SEPARATOR
        )
    }

    /// Parses a stored value. Only the first three separators split fields,
    /// so a title may itself contain `;`.
    pub fn parse(slot: usize, value: &str) -> Result<Self, LedgerError> {
        let mut fields = value.splitn(4, FIELD_SEPARATOR);
        let malformed = || LedgerError::MalformedRecord {
            slot,
            value: value.to_string(),
        };

        let id = fields.next().filter(|id| !id.is_empty()).ok_or_else(malformed)?;
        let job_type = fields.next().ok_or_else(malformed)?;
        let submitted_at = fields.next().ok_or_else(malformed)?;
        let title = fields.next().ok_or_else(malformed)?;

        Ok(Self::new(
            id.to_string(),
            job_type.to_string(),
            submitted_at.to_string(),
            title.to_string(),
        ))
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerStatusSnapshot {
    pub server_status: String,
    pub running: u64,
    pub queued: u64,
    pub completed: u64,
}

/// Body of `GET /results/stage/{job_id}`.
///
/// The service starts counting at `-1` before the first stage shows up in
/// the job log, hence the signed fields.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StageProgress {
    pub finished: i64,
    pub total: i64,
}

impl StageProgress {
    pub fn new(finished: i64, total: i64) -> Self {
        Self { finished, total }
    }

    /// True once every stage but the terminal one has been seen, which is
    /// when the result page must be reloaded.
    pub fn is_complete(&self) -> bool {
        self.total.checked_sub(1) == Some(self.finished)
    }

    pub fn percentage(&self) -> Option<i64> {
        if self.total == 0 {
            return None;
        }
        Some((self.finished as f64 / self.total as f64 * 100.0).round() as i64)
    }
}
