use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::CheckKind;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectionEntry {
    pub timestamp: String,
    pub attempt: u32,
    pub failed_checks: Vec<CheckKind>,
    pub excerpt: String,
}

/// In-memory diagnostics of review rejections. Oldest entries are dropped
/// once `capacity` is reached; nothing is persisted.
#[derive(Debug)]
pub struct RejectionLog {
    capacity: usize,
    entries: Mutex<VecDeque<RejectionEntry>>,
}

impl RejectionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, timestamp: String, attempt: u32, failed_checks: Vec<CheckKind>, response: &str) {
        let entry = RejectionEntry {
            timestamp,
            attempt,
            failed_checks,
            excerpt: response.chars().take(EXCERPT_CHARS).collect(),
        };
        // A poisoned log only loses diagnostics; keep serving.
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<RejectionEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let log = RejectionLog::new(2);
        for i in 0..3 {
            log.record(format!("t{i}"), 0, vec![CheckKind::MinLength], "x");
        }
        let ts: Vec<_> = log.entries().into_iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec!["t1", "t2"]);
        log.clear();
        assert!(log.is_empty());
    }
}
