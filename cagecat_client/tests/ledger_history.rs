//! Job history persisted through the file store.

use cagecat_client::error::LedgerError;
use cagecat_client::ledger::{JobLedger, LEDGER_CAPACITY};
use cagecat_client::sink::MemorySink;
use cagecat_client::store::{FileStore, KeyValueStore};
use cagecat_client::validate::is_valid_job_id;
use regex::Regex;

#[test]
fn recorded_job_is_listed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    let mut ledger = JobLedger::new(FileStore::open(&path).unwrap());
    for id in ["A123B456C789D12", "K555L666M777N88", "Q000R111S222T33"] {
        assert!(is_valid_job_id(id));
        ledger.record(id, "search", "my search").unwrap();
    }

    let ledger = JobLedger::new(FileStore::open(&path).unwrap());
    let ids = ledger.list_summaries();
    assert_eq!(ids, ["Q000R111S222T33", "K555L666M777N88", "A123B456C789D12"]);
    assert_eq!(ids.iter().filter(|id| *id == "K555L666M777N88").count(), 1);
}

#[test]
fn stored_record_uses_current_time_format() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = JobLedger::new(FileStore::open(dir.path().join("h.json")).unwrap());

    ledger.record("A1234567B89A12", "search", "t").unwrap();

    let value = ledger.store().get("0").unwrap();
    let fields: Vec<&str> = value.split(';').collect();
    assert_eq!(fields.len(), 4);
    assert!(fields.iter().all(|f| !f.is_empty()));
    assert_eq!(fields[0], "A1234567B89A12");
    assert_eq!(fields[1], "search");
    assert_eq!(fields[3], "t");

    let timestamp =
        Regex::new(r"^(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) \d{1,2} \d{4} - \d{1,2}:\d{2}:\d{2}$")
            .unwrap();
    assert!(timestamp.is_match(fields[2]), "bad timestamp {}", fields[2]);
}

#[test]
fn capacity_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    let mut ledger = JobLedger::new(FileStore::open(&path).unwrap());
    for i in 0..LEDGER_CAPACITY {
        ledger.record(&format!("A{i:03}B000C000D00"), "gne", "").unwrap();
    }

    let mut ledger = JobLedger::new(FileStore::open(&path).unwrap());
    assert_eq!(ledger.record("Z999Z999Z999Z99", "gne", "").unwrap(), None);
    assert_eq!(ledger.len(), LEDGER_CAPACITY);
    assert_eq!(
        ledger.store().get("249").unwrap().split(';').next(),
        Some("A249B000C000D00")
    );
}

#[test]
fn hand_edited_file_breaks_detailed_view_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(
        &path,
        r#"{ "0": "A123B456C789D12;search;Jan 1 2026 - 1:00:00;x", "1": "broken" }"#,
    )
    .unwrap();

    let ledger = JobLedger::new(FileStore::open(&path).unwrap());
    let sink = MemorySink::new();

    ledger.render_summaries(&sink);
    assert_eq!(sink.snapshot().summaries, ["A123B456C789D12"]);

    let err = ledger.render_detailed(&sink).unwrap_err();
    assert!(matches!(err, LedgerError::MalformedRecord { slot: 1, .. }));
}
