//! Issuance ledger — the authority's append-only record of every receipt
//! it has ever minted, and the sole owner of receipt terminal state.
//!
//! Like a spent-output set: each entry transitions out of `OPEN` at most
//! once. Consumption is a compare-and-set under the ledger lock, which
//! makes `verify_and_consume` a linearization point — two concurrent
//! attempts to consume the same receipt produce exactly one success.
//!
//! Entries are never discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use authmint_types::{
    AuthmintError, OperationKind, ReceiptId, Result, RunId, canonical,
};
use chrono::{DateTime, Utc};

/// Terminal state of a ledger entry.
///
/// Transitions are **monotonic**: `Open → Consumed` and `Open → Expired`
/// are the only ones, and each happens at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    /// Minted, not yet used. The only state receipts execute from.
    Open,
    /// The receipt authorized exactly one operation. **Irreversible.**
    Consumed,
    /// The expiry sweep retired this entry before it was used.
    Expired,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("OPEN"),
            Self::Consumed => f.write_str("CONSUMED"),
            Self::Expired => f.write_str("EXPIRED"),
        }
    }
}

/// One row of the issuance ledger.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub receipt_id: ReceiptId,
    pub run_id: RunId,
    pub operation_kind: OperationKind,
    pub enforceable: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub policy_id: String,
    pub terminal_state: TerminalState,
    pub consumed_at: Option<DateTime<Utc>>,
}

struct LedgerInner {
    /// Mint order, preserved forever.
    entries: Vec<LedgerEntry>,
    /// Receipt id → position in `entries`.
    index: HashMap<ReceiptId, usize>,
}

/// Append-only issuance record with one-time consumption.
pub struct IssuanceLedger {
    inner: Mutex<LedgerInner>,
}

impl IssuanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                entries: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().expect("issuance ledger lock poisoned")
    }

    /// Append a freshly minted entry.
    ///
    /// # Errors
    /// Returns [`AuthmintError::LedgerInconsistency`] if the receipt id is
    /// already present — a mint must never observe its own id twice.
    pub fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut inner = self.lock();
        if inner.index.contains_key(&entry.receipt_id) {
            return Err(AuthmintError::LedgerInconsistency {
                reason: format!("duplicate ledger entry for {}", entry.receipt_id),
            });
        }
        let position = inner.entries.len();
        inner.index.insert(entry.receipt_id.clone(), position);
        inner.entries.push(entry);
        Ok(())
    }

    /// Look up an entry by receipt id.
    #[must_use]
    pub fn entry(&self, receipt_id: &ReceiptId) -> Option<LedgerEntry> {
        let inner = self.lock();
        inner
            .index
            .get(receipt_id)
            .map(|&position| inner.entries[position].clone())
    }

    /// Consume an entry: the one-time `OPEN → CONSUMED` transition.
    ///
    /// Performed atomically under the ledger lock; of any number of
    /// concurrent calls for the same id, exactly one succeeds.
    ///
    /// # Errors
    /// - [`AuthmintError::UnknownReceipt`] if the id was never minted here
    /// - [`AuthmintError::AlreadyConsumed`] if the entry is already terminal
    /// - [`AuthmintError::ReceiptExpired`] if the expiry sweep retired it
    pub fn consume(&self, receipt_id: &ReceiptId, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut inner = self.lock();
        let position = *inner
            .index
            .get(receipt_id)
            .ok_or_else(|| AuthmintError::UnknownReceipt {
                receipt_id: receipt_id.clone(),
            })?;
        let entry = &mut inner.entries[position];
        match entry.terminal_state {
            TerminalState::Consumed => Err(AuthmintError::AlreadyConsumed {
                receipt_id: receipt_id.clone(),
                consumed_at: entry
                    .consumed_at
                    .map_or_else(|| "unknown".to_string(), |at| canonical::iso8601::format(&at)),
            }),
            TerminalState::Expired => Err(AuthmintError::ReceiptExpired {
                receipt_id: receipt_id.clone(),
                expires_at: entry.expires_at,
            }),
            TerminalState::Open => {
                entry.terminal_state = TerminalState::Consumed;
                entry.consumed_at = Some(now);
                Ok(now)
            }
        }
    }

    /// Retire every `OPEN` entry whose expiry has passed. Returns how many
    /// entries transitioned.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let mut swept = 0;
        for entry in &mut inner.entries {
            if entry.terminal_state == TerminalState::Open && now >= entry.expires_at {
                entry.terminal_state = TerminalState::Expired;
                swept += 1;
            }
        }
        swept
    }

    /// All entries in mint order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }

    /// Entries minted for one run, in mint order.
    #[must_use]
    pub fn entries_for_run(&self, run_id: &RunId) -> Vec<LedgerEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|entry| &entry.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Number of entries ever minted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl Default for IssuanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()
    }

    fn entry(run: &str, kind: OperationKind) -> LedgerEntry {
        let run_id = RunId::from(run);
        LedgerEntry {
            receipt_id: ReceiptId::derive(&run_id, kind, instant()),
            run_id,
            operation_kind: kind,
            enforceable: true,
            issued_at: instant(),
            expires_at: instant() + Duration::hours(1),
            policy_id: "policy-1".into(),
            terminal_state: TerminalState::Open,
            consumed_at: None,
        }
    }

    #[test]
    fn append_and_lookup() {
        let ledger = IssuanceLedger::new();
        let e = entry("r-1", OperationKind::PublishRelease);
        let id = e.receipt_id.clone();
        ledger.append(e).unwrap();

        let found = ledger.entry(&id).unwrap();
        assert_eq!(found.terminal_state, TerminalState::Open);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn duplicate_append_is_inconsistency() {
        let ledger = IssuanceLedger::new();
        let e = entry("r-1", OperationKind::PublishRelease);
        ledger.append(e.clone()).unwrap();
        let err = ledger.append(e).unwrap_err();
        assert!(matches!(err, AuthmintError::LedgerInconsistency { .. }));
    }

    #[test]
    fn consume_transitions_once() {
        let ledger = IssuanceLedger::new();
        let e = entry("r-1", OperationKind::PublishRelease);
        let id = e.receipt_id.clone();
        ledger.append(e).unwrap();

        let at = ledger.consume(&id, instant() + Duration::minutes(5)).unwrap();
        assert_eq!(at, instant() + Duration::minutes(5));
        let found = ledger.entry(&id).unwrap();
        assert_eq!(found.terminal_state, TerminalState::Consumed);
        assert_eq!(found.consumed_at, Some(at));

        let err = ledger.consume(&id, instant() + Duration::minutes(6)).unwrap_err();
        assert!(matches!(err, AuthmintError::AlreadyConsumed { .. }));
    }

    #[test]
    fn unknown_receipt_rejected() {
        let ledger = IssuanceLedger::new();
        let err = ledger
            .consume(&ReceiptId::from("receipt-deadbeef"), instant())
            .unwrap_err();
        assert!(matches!(err, AuthmintError::UnknownReceipt { .. }));
    }

    #[test]
    fn concurrent_consume_exactly_one_success() {
        let ledger = IssuanceLedger::new();
        let e = entry("r-1", OperationKind::PublishRelease);
        let id = e.receipt_id.clone();
        ledger.append(e).unwrap();

        let outcomes: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ledger = &ledger;
                    let id = id.clone();
                    scope.spawn(move || ledger.consume(&id, instant()).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(
            outcomes.iter().filter(|ok| **ok).count(),
            1,
            "exactly one concurrent consume must win"
        );
    }

    #[test]
    fn sweep_expires_only_open_past_expiry() {
        let ledger = IssuanceLedger::new();
        let fresh = entry("r-1", OperationKind::PublishRelease);
        let old = entry("r-2", OperationKind::TagRepo);
        let used = entry("r-3", OperationKind::OpenPr);
        let fresh_id = fresh.receipt_id.clone();
        let old_id = old.receipt_id.clone();
        let used_id = used.receipt_id.clone();
        ledger.append(fresh).unwrap();
        ledger.append(old).unwrap();
        ledger.append(used).unwrap();
        ledger.consume(&used_id, instant()).unwrap();

        // Two hours later: fresh is past expiry too, but the consumed entry
        // must stay consumed.
        let swept = ledger.sweep_expired(instant() + Duration::hours(2));
        assert_eq!(swept, 2);
        assert_eq!(ledger.entry(&fresh_id).unwrap().terminal_state, TerminalState::Expired);
        assert_eq!(ledger.entry(&old_id).unwrap().terminal_state, TerminalState::Expired);
        assert_eq!(ledger.entry(&used_id).unwrap().terminal_state, TerminalState::Consumed);

        // Expired entries cannot be consumed.
        let err = ledger
            .consume(&old_id, instant() + Duration::hours(3))
            .unwrap_err();
        assert!(matches!(err, AuthmintError::ReceiptExpired { .. }));
    }

    #[test]
    fn entries_for_run_preserve_mint_order() {
        let ledger = IssuanceLedger::new();
        let a = entry("r-1", OperationKind::PublishRelease);
        let b = entry("r-1", OperationKind::TagRepo);
        let other = entry("r-2", OperationKind::OpenPr);
        let a_id = a.receipt_id.clone();
        let b_id = b.receipt_id.clone();
        ledger.append(a).unwrap();
        ledger.append(other).unwrap();
        ledger.append(b).unwrap();

        let run_entries = ledger.entries_for_run(&RunId::from("r-1"));
        assert_eq!(run_entries.len(), 2);
        assert_eq!(run_entries[0].receipt_id, a_id);
        assert_eq!(run_entries[1].receipt_id, b_id);
    }

    #[test]
    fn terminal_state_display() {
        assert_eq!(TerminalState::Open.to_string(), "OPEN");
        assert_eq!(TerminalState::Consumed.to_string(), "CONSUMED");
        assert_eq!(TerminalState::Expired.to_string(), "EXPIRED");
    }
}
