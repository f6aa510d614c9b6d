//! Input checks applied before a job id or accession list goes to the server.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Job ids carry a letter at every fourth position: `A123B456C789D12`.
pub const JOB_ID_PATTERN: &str = r"^([A-Z]\d{3}){3}[A-Z]\d{2}$";

/// NCBI protein accessions such as `ABC12345`, `ABC1234567` or
/// `PAK92813.22`, optionally versioned up to `.999`.
pub const ACCESSION_PATTERN: &str = r"^[A-Z]{3}(\d{5}|\d{7})(\.\d{1,3})? *$";

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(JOB_ID_PATTERN).expect("valid regex"));

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ACCESSION_PATTERN).expect("valid regex"));

pub fn is_valid_job_id(id: &str) -> bool {
    JOB_ID_RE.is_match(id)
}

pub fn is_valid_accession(accession: &str) -> bool {
    ACCESSION_RE.is_match(accession)
}

/// Ids and job types are stored `;` separated; only the title may carry
/// the separator.
pub fn is_storable_field(value: &str) -> bool {
    !value.contains(crate::FIELD_SEPARATOR)
}

/// Outcome of checking a newline separated accession list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessionReport {
    /// Valid entries in input order, first occurrence only.
    pub accepted: Vec<String>,
    /// Lines that failed the pattern, plus every repeat of an earlier line.
    pub invalid: Vec<String>,
}

impl AccessionReport {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Empty lines are skipped. A line seen before is rejected even when it is
/// a well formed accession.
pub fn validate_accessions(text: &str) -> AccessionReport {
    let mut report = AccessionReport::default();
    let mut seen = HashSet::new();

    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        if !seen.insert(line) {
            report.invalid.push(line.to_string());
            continue;
        }
        if is_valid_accession(line) {
            report.accepted.push(line.to_string());
        } else {
            report.invalid.push(line.to_string());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids() {
        assert!(is_valid_job_id("A123B456C789D12"));
        assert!(is_valid_job_id("Z000Z000Z000Z00"));
        assert!(!is_valid_job_id("A123B456C789D1"));
        assert!(!is_valid_job_id("A123B456C789D123"));
        assert!(!is_valid_job_id("a123B456C789D12"));
        assert!(!is_valid_job_id("A1234567B89A12"));
        assert!(!is_valid_job_id(""));
    }

    #[test]
    fn storable_fields() {
        assert!(is_storable_field("search"));
        assert!(is_storable_field(""));
        assert!(!is_storable_field("search;gne"));
    }

    #[test]
    fn accessions() {
        assert!(is_valid_accession("ABC1234567"));
        assert!(is_valid_accession("ABC12345"));
        assert!(is_valid_accession("PAK92813.22"));
        assert!(is_valid_accession("ABC9281230.999"));
        assert!(is_valid_accession("ABC12345  "));
        assert!(!is_valid_accession("ABC123456"));
        assert!(!is_valid_accession("ABC12345.1000"));
        assert!(!is_valid_accession("AB12345"));
    }

    #[test]
    fn accession_list_with_duplicates_and_blank_lines() {
        let report = validate_accessions("ABC12345\n\nXYZ1234567\nnope\nABC12345\n");
        assert_eq!(report.accepted, ["ABC12345", "XYZ1234567"]);
        assert_eq!(report.invalid, ["nope", "ABC12345"]);
        assert!(!report.is_valid());
    }

    #[test]
    fn empty_accession_list_is_valid() {
        let report = validate_accessions("");
        assert!(report.is_valid());
        assert!(report.accepted.is_empty());
    }
}
