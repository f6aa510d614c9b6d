//! Bounded local history of submitted jobs.
//!
//! Records live in numbered slots `"0"` to `"249"` of a [`KeyValueStore`].
//! A new record always takes the lowest free slot and nothing is ever
//! removed, so occupied slots form a contiguous prefix. Once every slot is
//! taken, further submissions are dropped silently.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::error::LedgerError;
use crate::sink::RenderSink;
use crate::store::KeyValueStore;
use crate::JobRecord;

pub const LEDGER_CAPACITY: usize = 250;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Mon D YYYY - H:MM:SS`
pub fn format_timestamp(at: NaiveDateTime) -> String {
    format!(
        "{} {} {} - {}:{:02}:{:02}",
        MONTHS[at.month0() as usize],
        at.day(),
        at.year(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

pub struct JobLedger<S> {
    store: S,
}

impl<S: KeyValueStore> JobLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Records a submission stamped with the current local time.
    ///
    /// `id` and `job_type` must not contain `;`, otherwise the fields shift
    /// when the record is read back. See [`crate::validate::is_storable_field`].
    pub fn record(
        &mut self,
        id: &str,
        job_type: &str,
        title: &str,
    ) -> Result<Option<usize>, LedgerError> {
        self.record_at(id, job_type, title, Local::now().naive_local())
    }

    /// Writes the record into the first empty slot and returns that slot,
    /// or `None` when the ledger is full.
    pub fn record_at(
        &mut self,
        id: &str,
        job_type: &str,
        title: &str,
        at: NaiveDateTime,
    ) -> Result<Option<usize>, LedgerError> {
        let Some(slot) = (0..LEDGER_CAPACITY).find(|slot| self.store.get(&slot.to_string()).is_none())
        else {
            tracing::debug!(job_id = id, "Job history full, submission not recorded");
            return Ok(None);
        };

        let record = JobRecord::new(
            id.to_string(),
            job_type.to_string(),
            format_timestamp(at),
            title.to_string(),
        );
        let value = record.encode();
        self.store.set(&slot.to_string(), value.clone())?;
        tracing::debug!(slot, record = %value, "Recorded job");
        Ok(Some(slot))
    }

    /// Number of occupied slots in the contiguous prefix.
    pub fn len(&self) -> usize {
        (0..LEDGER_CAPACITY)
            .take_while(|slot| self.store.get(&slot.to_string()).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the stored jobs, last slot first.
    ///
    /// A missing or unreadable slot ends the listing: whatever was read
    /// before it is returned.
    pub fn list_summaries(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for slot in 0..LEDGER_CAPACITY {
            let Some(value) = self.store.get(&slot.to_string()) else {
                break;
            };
            match JobRecord::parse(slot, &value) {
                Ok(record) => ids.push(record.id),
                Err(e) => {
                    tracing::warn!(slot, error = %e, "Error fetching previous jobs");
                    break;
                }
            }
        }
        ids.reverse();
        ids
    }

    /// All stored records, last slot first. A malformed record fails the
    /// whole listing.
    pub fn list_detailed(&self) -> Result<Vec<JobRecord>, LedgerError> {
        let mut records = Vec::new();
        for slot in 0..LEDGER_CAPACITY {
            let Some(value) = self.store.get(&slot.to_string()) else {
                break;
            };
            records.push(JobRecord::parse(slot, &value)?);
        }
        records.reverse();
        Ok(records)
    }

    pub fn render_summaries(&self, sink: &dyn RenderSink) {
        sink.display_summaries(&self.list_summaries());
    }

    pub fn render_detailed(&self, sink: &dyn RenderSink) -> Result<(), LedgerError> {
        let records = self.list_detailed()?;
        sink.display_history(&records);
        Ok(())
    }
}
