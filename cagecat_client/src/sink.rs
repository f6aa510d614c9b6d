//! Rendering targets for ledger listings and poller updates.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::{JobRecord, ServerStatusSnapshot};

/// Column headers of the detailed history table, in display order.
pub const HISTORY_HEADER: [&str; 4] = ["Job ID", "Type of job", "Date", "Title"];

/// Everything the ledger and the poller write to.
///
/// Implementations are shared between the polling tasks, so every method
/// takes `&self`.
pub trait RenderSink: Send + Sync {
    /// Job ids, already in display order (most recently stored slot first).
    fn display_summaries(&self, ids: &[String]);

    /// Records in display order. The header row goes above them.
    fn display_history(&self, records: &[JobRecord]);

    fn display_status(&self, status: &ServerStatusSnapshot);

    /// Stages are numbered from 1. Marking twice must be harmless.
    fn mark_stage_complete(&self, stage: u32);

    /// The job's result is ready and its page should be loaded again.
    fn reload(&self, job_id: &str);
}

/// Writes everything to stdout.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl RenderSink for TerminalSink {
    fn display_summaries(&self, ids: &[String]) {
        println!("Previous jobs");
        for id in ids {
            println!("  {id}");
        }
    }

    fn display_history(&self, records: &[JobRecord]) {
        println!(
            "{:<17} {:<18} {:<24} {}",
            HISTORY_HEADER[0], HISTORY_HEADER[1], HISTORY_HEADER[2], HISTORY_HEADER[3]
        );
        for r in records {
            println!(
                "{:<17} {:<18} {:<24} {}",
                r.id, r.job_type, r.submitted_at, r.title
            );
        }
    }

    fn display_status(&self, status: &ServerStatusSnapshot) {
        println!(
            "server: {} | running: {} | queued: {} | completed: {}",
            status.server_status, status.running, status.queued, status.completed
        );
    }

    fn mark_stage_complete(&self, stage: u32) {
        println!("✅ stage {stage} complete");
    }

    fn reload(&self, job_id: &str) {
        println!("🔄 {job_id} finished, results are ready");
    }
}

/// Keeps the latest rendered state in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemorySinkState>,
}

#[derive(Debug, Default, Clone)]
pub struct MemorySinkState {
    pub summaries: Vec<String>,
    pub history: Vec<JobRecord>,
    pub status: Option<ServerStatusSnapshot>,
    pub completed_stages: BTreeSet<u32>,
    /// Every `mark_stage_complete` call, in order.
    pub mark_calls: Vec<u32>,
    pub reloads: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemorySinkState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        // A panicking writer leaves plain data behind, still fine to read.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RenderSink for MemorySink {
    fn display_summaries(&self, ids: &[String]) {
        self.lock().summaries = ids.to_vec();
    }

    fn display_history(&self, records: &[JobRecord]) {
        self.lock().history = records.to_vec();
    }

    fn display_status(&self, status: &ServerStatusSnapshot) {
        self.lock().status = Some(status.clone());
    }

    fn mark_stage_complete(&self, stage: u32) {
        let mut state = self.lock();
        state.completed_stages.insert(stage);
        state.mark_calls.push(stage);
    }

    fn reload(&self, job_id: &str) {
        self.lock().reloads.push(job_id.to_string());
    }
}
