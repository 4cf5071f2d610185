//! Audit trail of user operations.
//!
//! Each record goes to `tracing` under the `audit` target and into a bounded
//! in-memory journal used by the admin report.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Refunded,
    Rejected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Refunded => "refunded",
            Status::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub operation: String,
    pub amount: f64,
    pub status: Status,
    pub detail: String,
}

fn rfc3339<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl AuditRecord {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"unserializable\":\"{e}\"}}"))
    }
}

/// Aggregates over the journal for the admin report.
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    /// (operation, status) → count
    pub counts: BTreeMap<(String, Status), usize>,
    /// Sum of amounts on successful paid operations.
    pub revenue: f64,
    pub total: usize,
}

pub struct AuditLog {
    journal: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            journal: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(
        &self,
        user_id: i64,
        username: &str,
        operation: &str,
        amount: f64,
        status: Status,
        detail: impl Into<String>,
    ) -> AuditRecord {
        let entry = AuditRecord {
            timestamp: Utc::now(),
            user_id,
            username: username.to_string(),
            operation: operation.to_string(),
            amount,
            status,
            detail: detail.into(),
        };

        info!(
            target: "audit",
            user_id,
            operation,
            amount,
            status = %status,
            "📝 {}",
            entry.to_json()
        );

        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        if journal.len() == self.capacity {
            journal.pop_front();
        }
        journal.push_back(entry.clone());
        entry
    }

    /// Most recent records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = journal.len().saturating_sub(limit);
        journal.iter().skip(skip).cloned().collect()
    }

    pub fn summary(&self) -> Summary {
        let journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = Summary { total: journal.len(), ..Default::default() };
        for entry in journal.iter() {
            *summary.counts.entry((entry.operation.clone(), entry.status)).or_insert(0) += 1;
            if entry.status == Status::Success {
                summary.revenue += entry.amount;
            }
        }
        summary
    }
}
