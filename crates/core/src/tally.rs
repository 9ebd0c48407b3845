//! Read-side tally view.
//!
//! The ledger never ranks candidates. Consumers that want a leader or vote
//! shares build a `Tally`, either from a ledger snapshot or by following its
//! event log.

use serde::Serialize;

use crate::{CandidateId, Error, Ledger, LedgerEvent};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    pub id: CandidateId,
    pub name: String,
    pub votes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    entries: Vec<TallyEntry>,
    /// Number of ledger events applied so far; doubles as the catch-up cursor.
    cursor: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the ledger's current tallies.
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            entries: ledger
                .candidates()
                .map(|c| TallyEntry {
                    id: c.id,
                    name: c.name.clone(),
                    votes: c.vote_count,
                })
                .collect(),
            cursor: ledger.events().len(),
        }
    }

    /// Apply any ledger events this view has not seen yet.
    pub fn catch_up(&mut self, ledger: &Ledger) -> Result<(), Error> {
        for event in ledger.events_since(self.cursor) {
            self.apply(event)?;
        }
        Ok(())
    }

    /// Apply one event. Events must arrive in ledger order.
    pub fn apply(&mut self, event: &LedgerEvent) -> Result<(), Error> {
        match event {
            LedgerEvent::CandidateAdded { id, name } => {
                let expected = self.entries.len() as CandidateId + 1;
                if *id != expected {
                    return Err(Error::InvalidInput(format!(
                        "candidate {} added out of order, expected {}",
                        id, expected
                    )));
                }
                self.entries.push(TallyEntry {
                    id: *id,
                    name: name.clone(),
                    votes: 0,
                });
            }
            LedgerEvent::VoteCast {
                candidate_id,
                vote_count,
            } => {
                let entry = self
                    .entries
                    .iter_mut()
                    .find(|e| e.id == *candidate_id)
                    .ok_or(Error::CandidateNotFound(*candidate_id))?;
                entry.votes = *vote_count;
            }
        }

        self.cursor += 1;
        Ok(())
    }

    pub fn entries(&self) -> &[TallyEntry] {
        &self.entries
    }

    pub fn total_votes(&self) -> u64 {
        self.entries.iter().map(|e| e.votes).sum()
    }

    /// Candidate with the most votes. On a tie the lowest id wins.
    pub fn leader(&self) -> Option<&TallyEntry> {
        let mut leader: Option<&TallyEntry> = None;
        for entry in &self.entries {
            if leader.is_none_or(|top| entry.votes > top.votes) {
                leader = Some(entry);
            }
        }
        leader
    }

    /// Share of all votes, in percent. Zero when nobody has voted.
    pub fn share(&self, candidate_id: CandidateId) -> Option<f64> {
        let entry = self.entries.iter().find(|e| e.id == candidate_id)?;
        let total = self.total_votes();
        if total == 0 {
            return Some(0.0);
        }
        Some(entry.votes as f64 * 100.0 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Identity, LedgerConfig};

    const ADMIN: Identity = Identity::from_bytes([1u8; 32]);

    fn voter(n: u8) -> Identity {
        Identity::from_bytes([n; 32])
    }

    fn ledger_with(names: &[&str]) -> Ledger {
        let mut ledger = Ledger::new(LedgerConfig {
            chain_id: "tally".into(),
            admin: ADMIN,
            trusted_forwarder: None,
        })
        .unwrap();
        for name in names {
            ledger.add_candidate(&ADMIN, name).unwrap();
        }
        ledger
    }

    #[test]
    fn empty_tally_has_no_leader() {
        assert_eq!(Tally::new().leader(), None);
        assert_eq!(Tally::from_ledger(&ledger_with(&[])).leader(), None);
    }

    #[test]
    fn tie_goes_to_first_candidate() {
        let mut ledger = ledger_with(&["Alice", "Bob", "Charlie"]);
        ledger.vote(&voter(10), 2).unwrap();
        ledger.vote(&voter(11), 3).unwrap();

        let tally = Tally::from_ledger(&ledger);
        assert_eq!(tally.leader().map(|e| e.id), Some(2));
        assert_eq!(tally.total_votes(), 2);
    }

    #[test]
    fn no_votes_leader_is_first() {
        let tally = Tally::from_ledger(&ledger_with(&["Alice", "Bob"]));
        assert_eq!(tally.leader().map(|e| e.name.as_str()), Some("Alice"));
        assert_eq!(tally.share(1), Some(0.0));
        assert_eq!(tally.share(3), None);
    }

    #[test]
    fn following_events_matches_snapshot() {
        let mut ledger = ledger_with(&["Alice"]);
        let mut live = Tally::new();
        live.catch_up(&ledger).unwrap();

        ledger.add_candidate(&ADMIN, "Bob").unwrap();
        ledger.vote(&voter(10), 2).unwrap();
        ledger.vote(&voter(11), 2).unwrap();
        ledger.vote(&voter(12), 1).unwrap();
        live.catch_up(&ledger).unwrap();

        assert_eq!(live, Tally::from_ledger(&ledger));
        assert_eq!(live.leader().map(|e| e.id), Some(2));
        let share = live.share(2).unwrap();
        assert!((share - 66.666).abs() < 0.01);
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut tally = Tally::new();
        let err = tally
            .apply(&LedgerEvent::CandidateAdded {
                id: 2,
                name: "Bob".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert_eq!(
            tally.apply(&LedgerEvent::VoteCast {
                candidate_id: 1,
                vote_count: 1
            }),
            Err(Error::CandidateNotFound(1))
        );
    }
}
