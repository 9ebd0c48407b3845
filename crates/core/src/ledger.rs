//! The voting ledger: candidates, tallies, and the one-vote rule.
//!
//! All access control lives here, so it holds whether a call arrives directly
//! or through the relay. Every entry point checks its preconditions against
//! current state before touching anything; a rejected call leaves the ledger
//! unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::{Error, Hash, Identity, IntentAction};

/// Candidate ids are dense, starting at 1.
pub type CandidateId = u64;

/// Hash of a ledger's immutable configuration.
pub type LedgerId = Hash;

/// A registered candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub vote_count: u64,
}

/// Per-voter record. Present only once the voter has voted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub candidate_id: CandidateId,
}

/// Configuration fixed at ledger creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Distinguishes otherwise identical deployments.
    pub chain_id: String,
    /// The only identity allowed to add candidates.
    pub admin: Identity,
    /// The only submitter allowed to act on a voter's behalf.
    pub trusted_forwarder: Option<Identity>,
}

impl LedgerConfig {
    pub fn ledger_id(&self) -> Result<LedgerId, Error> {
        Hash::of_value(self)
    }
}

/// Change notification for subscribers building live views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    CandidateAdded {
        id: CandidateId,
        name: String,
    },
    VoteCast {
        candidate_id: CandidateId,
        vote_count: u64,
    },
}

/// Result of a successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    CandidateAdded {
        id: CandidateId,
    },
    VoteCast {
        candidate_id: CandidateId,
        vote_count: u64,
    },
}

/// The ledger state machine.
///
/// Deserialization re-checks every structural invariant, so an edited snapshot
/// is rejected rather than resumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLedger")]
pub struct Ledger {
    id: LedgerId,
    config: LedgerConfig,
    /// Index `i` holds the candidate with id `i + 1`.
    candidates: Vec<Candidate>,
    voted: BTreeMap<Identity, VoteRecord>,
    /// Every successful mutation, in order of application.
    events: Vec<LedgerEvent>,
}

/// Ledger state as found on the wire, before validation.
#[derive(Deserialize)]
struct RawLedger {
    id: LedgerId,
    config: LedgerConfig,
    candidates: Vec<Candidate>,
    voted: BTreeMap<Identity, VoteRecord>,
    events: Vec<LedgerEvent>,
}

impl TryFrom<RawLedger> for Ledger {
    type Error = Error;

    fn try_from(raw: RawLedger) -> Result<Self, Error> {
        let RawLedger {
            id,
            config,
            candidates,
            voted,
            events,
        } = raw;

        if id != config.ledger_id()? {
            return Err(Error::InvalidInput(
                "ledger id does not match its configuration".to_string(),
            ));
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.id != index as u64 + 1 {
                return Err(Error::InvalidInput(format!(
                    "candidate at position {} has id {}",
                    index + 1,
                    candidate.id
                )));
            }
            if candidate.name.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "candidate {} has an empty name",
                    candidate.id
                )));
            }
        }

        let mut tallies = vec![0u64; candidates.len()];
        for record in voted.values() {
            let tally = record
                .candidate_id
                .checked_sub(1)
                .and_then(|index| tallies.get_mut(index as usize))
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "vote record for unknown candidate {}",
                        record.candidate_id
                    ))
                })?;
            *tally += 1;
        }
        if let Some(candidate) = candidates
            .iter()
            .zip(&tallies)
            .find_map(|(candidate, &tally)| (candidate.vote_count != tally).then_some(candidate))
        {
            return Err(Error::InvalidInput(format!(
                "candidate {} claims {} votes that no voter record backs",
                candidate.id, candidate.vote_count
            )));
        }

        Ok(Self {
            id,
            config,
            candidates,
            voted,
            events,
        })
    }
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new(config: LedgerConfig) -> Result<Self, Error> {
        Ok(Self {
            id: config.ledger_id()?,
            config,
            candidates: Vec::new(),
            voted: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    pub fn id(&self) -> &LedgerId {
        &self.id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn admin(&self) -> &Identity {
        &self.config.admin
    }

    pub fn trusted_forwarder(&self) -> Option<&Identity> {
        self.config.trusted_forwarder.as_ref()
    }

    /// Register a new candidate. Admin only.
    ///
    /// `caller` is taken as authenticated. Untrusted callers go through
    /// [`crate::Runtime`] with their key or through the relay.
    pub fn add_candidate(&mut self, caller: &Identity, name: &str) -> Result<CandidateId, Error> {
        if caller != self.admin() {
            warn!(caller = %caller, "non-admin attempted to add a candidate");
            return Err(Error::Unauthorized {
                caller: *caller,
                operation: "add candidates",
            });
        }

        if name.trim().is_empty() {
            return Err(Error::InvalidInput("candidate name is empty".to_string()));
        }

        let id = self.candidates_count() + 1;
        self.candidates.push(Candidate {
            id,
            name: name.to_string(),
            vote_count: 0,
        });

        info!(candidate_id = id, name, "candidate added");
        self.events.push(LedgerEvent::CandidateAdded {
            id,
            name: name.to_string(),
        });

        Ok(id)
    }

    /// Cast the caller's single vote. Returns the candidate's new tally.
    ///
    /// `caller` is taken as authenticated, as for [`Ledger::add_candidate`].
    pub fn vote(&mut self, caller: &Identity, candidate_id: CandidateId) -> Result<u64, Error> {
        if self.has_voted(caller) {
            return Err(Error::AlreadyVoted(*caller));
        }

        let index = self.index_of(candidate_id)?;

        // Both mutations happen together, after every check has passed.
        let candidate = &mut self.candidates[index];
        candidate.vote_count += 1;
        let vote_count = candidate.vote_count;
        self.voted.insert(*caller, VoteRecord { candidate_id });

        info!(voter = %caller, candidate_id, vote_count, "vote cast");
        self.events.push(LedgerEvent::VoteCast {
            candidate_id,
            vote_count,
        });

        Ok(vote_count)
    }

    /// Execute `action` as `voter`, on behalf of the trusted forwarder.
    ///
    /// The forwarder is responsible for having authenticated `voter`. Any other
    /// submitter is refused, so a caller cannot name an arbitrary identity.
    pub fn execute_forwarded(
        &mut self,
        submitter: &Identity,
        voter: &Identity,
        action: &IntentAction,
    ) -> Result<Outcome, Error> {
        if self.trusted_forwarder() != Some(submitter) {
            warn!(submitter = %submitter, "untrusted submitter attempted forwarded dispatch");
            return Err(Error::Unauthorized {
                caller: *submitter,
                operation: "dispatch on behalf of another identity",
            });
        }

        self.dispatch(voter, action)
    }

    fn dispatch(&mut self, caller: &Identity, action: &IntentAction) -> Result<Outcome, Error> {
        match action {
            IntentAction::Vote { candidate_id } => {
                let vote_count = self.vote(caller, *candidate_id)?;
                Ok(Outcome::VoteCast {
                    candidate_id: *candidate_id,
                    vote_count,
                })
            }
            IntentAction::AddCandidate { name } => {
                let id = self.add_candidate(caller, name)?;
                Ok(Outcome::CandidateAdded { id })
            }
        }
    }

    fn index_of(&self, candidate_id: CandidateId) -> Result<usize, Error> {
        if candidate_id == 0 || candidate_id > self.candidates_count() {
            return Err(Error::CandidateNotFound(candidate_id));
        }
        Ok((candidate_id - 1) as usize)
    }

    /// Look up a candidate. `None` for ids outside `1..=candidates_count()`.
    pub fn get_candidate(&self, candidate_id: CandidateId) -> Option<&Candidate> {
        self.index_of(candidate_id)
            .ok()
            .map(|index| &self.candidates[index])
    }

    pub fn candidates_count(&self) -> u64 {
        self.candidates.len() as u64
    }

    /// All candidates in id order.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.voted.contains_key(identity)
    }

    /// The candidate `identity` voted for, if any. Votes are public.
    pub fn vote_of(&self, identity: &Identity) -> Option<CandidateId> {
        self.voted.get(identity).map(|record| record.candidate_id)
    }

    pub fn total_votes(&self) -> u64 {
        self.voted.len() as u64
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Events at positions `cursor..`, for subscribers catching up.
    pub fn events_since(&self, cursor: usize) -> &[LedgerEvent] {
        self.events.get(cursor..).unwrap_or(&[])
    }

    /// Content hash of the full ledger state.
    pub fn state_hash(&self) -> Result<Hash, Error> {
        Hash::of_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Identity = Identity::from_bytes([1u8; 32]);
    const FORWARDER: Identity = Identity::from_bytes([2u8; 32]);
    const VOTER: Identity = Identity::from_bytes([3u8; 32]);

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig {
            chain_id: "test".into(),
            admin: ADMIN,
            trusted_forwarder: Some(FORWARDER),
        })
        .unwrap()
    }

    #[test]
    fn ids_are_dense_from_one() {
        let mut ledger = ledger();
        assert_eq!(ledger.add_candidate(&ADMIN, "Alice").unwrap(), 1);
        assert_eq!(ledger.add_candidate(&ADMIN, "Bob").unwrap(), 2);
        assert_eq!(ledger.candidates_count(), 2);
        assert_eq!(
            ledger.get_candidate(1),
            Some(&Candidate {
                id: 1,
                name: "Alice".into(),
                vote_count: 0
            })
        );
        assert_eq!(ledger.get_candidate(0), None);
        assert_eq!(ledger.get_candidate(3), None);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.add_candidate(&ADMIN, "   "),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(ledger.candidates_count(), 0);
    }

    #[test]
    fn non_admin_cannot_add() {
        let mut ledger = ledger();
        let err = ledger.add_candidate(&VOTER, "Mallory").unwrap_err();
        assert!(matches!(err, Error::Unauthorized { caller, .. } if caller == VOTER));
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn vote_updates_tally_and_record() {
        let mut ledger = ledger();
        ledger.add_candidate(&ADMIN, "Alice").unwrap();

        assert_eq!(ledger.vote(&VOTER, 1).unwrap(), 1);
        assert!(ledger.has_voted(&VOTER));
        assert_eq!(ledger.vote_of(&VOTER), Some(1));
        assert_eq!(ledger.total_votes(), 1);
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::VoteCast {
                candidate_id: 1,
                vote_count: 1
            })
        );
    }

    #[test]
    fn out_of_range_vote_leaves_voter_free() {
        let mut ledger = ledger();
        ledger.add_candidate(&ADMIN, "Alice").unwrap();

        assert_eq!(ledger.vote(&VOTER, 2), Err(Error::CandidateNotFound(2)));
        assert_eq!(ledger.vote(&VOTER, 0), Err(Error::CandidateNotFound(0)));
        assert!(!ledger.has_voted(&VOTER));
        assert_eq!(ledger.vote(&VOTER, 1).unwrap(), 1);
    }

    #[test]
    fn forwarded_dispatch_requires_trusted_submitter() {
        let mut ledger = ledger();
        ledger.add_candidate(&ADMIN, "Alice").unwrap();
        let action = IntentAction::Vote { candidate_id: 1 };

        let err = ledger
            .execute_forwarded(&VOTER, &VOTER, &action)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
        assert!(!ledger.has_voted(&VOTER));

        let outcome = ledger
            .execute_forwarded(&FORWARDER, &VOTER, &action)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::VoteCast {
                candidate_id: 1,
                vote_count: 1
            }
        );
        assert!(ledger.has_voted(&VOTER));
        assert!(!ledger.has_voted(&FORWARDER));
    }

    #[test]
    fn forwarded_add_candidate_still_checks_admin() {
        let mut ledger = ledger();
        let action = IntentAction::AddCandidate {
            name: "Mallory".into(),
        };

        assert!(matches!(
            ledger.execute_forwarded(&FORWARDER, &VOTER, &action),
            Err(Error::Unauthorized { .. })
        ));
        assert_eq!(
            ledger.execute_forwarded(&FORWARDER, &ADMIN, &action),
            Ok(Outcome::CandidateAdded { id: 1 })
        );
    }

    #[test]
    fn no_forwarder_means_no_forwarded_dispatch() {
        let mut ledger = Ledger::new(LedgerConfig {
            chain_id: "direct-only".into(),
            admin: ADMIN,
            trusted_forwarder: None,
        })
        .unwrap();

        assert!(matches!(
            ledger.execute_forwarded(
                &FORWARDER,
                &ADMIN,
                &IntentAction::AddCandidate { name: "A".into() }
            ),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn events_since_cursor() {
        let mut ledger = ledger();
        ledger.add_candidate(&ADMIN, "Alice").unwrap();
        ledger.add_candidate(&ADMIN, "Bob").unwrap();
        ledger.vote(&VOTER, 2).unwrap();

        assert_eq!(ledger.events_since(0).len(), 3);
        assert_eq!(ledger.events_since(2).len(), 1);
        assert!(ledger.events_since(3).is_empty());
        assert!(ledger.events_since(99).is_empty());
    }

    #[test]
    fn ledger_id_depends_on_config() {
        let a = ledger();
        let b = Ledger::new(LedgerConfig {
            chain_id: "other".into(),
            admin: ADMIN,
            trusted_forwarder: Some(FORWARDER),
        })
        .unwrap();
        assert_ne!(a.id(), b.id());
    }

    fn snapshot_json() -> serde_json::Value {
        let mut ledger = ledger();
        ledger.add_candidate(&ADMIN, "Alice").unwrap();
        ledger.add_candidate(&ADMIN, "Bob").unwrap();
        ledger.vote(&VOTER, 2).unwrap();
        serde_json::to_value(&ledger).unwrap()
    }

    fn load(json: serde_json::Value) -> Result<Ledger, serde_json::Error> {
        serde_json::from_value(json)
    }

    #[test]
    fn snapshot_roundtrip_is_accepted() {
        let ledger = load(snapshot_json()).unwrap();
        assert_eq!(ledger.get_candidate(2).unwrap().vote_count, 1);
        assert_eq!(ledger.id(), &ledger.config().ledger_id().unwrap());
    }

    #[test]
    fn snapshot_with_edited_config_is_rejected() {
        let mut json = snapshot_json();
        json["config"]["admin"] = serde_json::json!(Identity::from_bytes([9u8; 32]).to_hex());

        let err = load(json).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn snapshot_with_sparse_ids_is_rejected() {
        let mut json = snapshot_json();
        json["candidates"][1]["id"] = serde_json::json!(7);

        let err = load(json).unwrap_err();
        assert!(err.to_string().contains("has id 7"), "{err}");
    }

    #[test]
    fn snapshot_with_blank_name_is_rejected() {
        let mut json = snapshot_json();
        json["candidates"][0]["name"] = serde_json::json!(" ");

        assert!(load(json).is_err());
    }

    #[test]
    fn snapshot_with_inflated_tally_is_rejected() {
        let mut json = snapshot_json();
        json["candidates"][0]["vote_count"] = serde_json::json!(5);

        let err = load(json).unwrap_err();
        assert!(err.to_string().contains("candidate 1 claims 5 votes"), "{err}");
    }

    #[test]
    fn snapshot_with_orphan_vote_record_is_rejected() {
        let mut json = snapshot_json();
        json["voted"][VOTER.to_hex()]["candidate_id"] = serde_json::json!(3);

        let err = load(json).unwrap_err();
        assert!(err.to_string().contains("candidate 3"), "{err}");
    }
}
