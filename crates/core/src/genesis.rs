//! Genesis ledger creation.
//!
//! A ledger is born with its admin and trusted forwarder fixed, and optionally
//! an initial slate of candidates registered by the admin in the order given.

use crate::{Error, Identity, Ledger, LedgerConfig};

/// Parameters for creating a genesis ledger.
pub struct GenesisParams {
    pub chain_id: String,
    pub admin: Identity,
    pub trusted_forwarder: Option<Identity>,
    /// Candidates registered at genesis; ids follow list order.
    pub candidates: Vec<String>,
}

/// Create a genesis ledger from parameters.
pub fn create_genesis(params: GenesisParams) -> Result<Ledger, Error> {
    let admin = params.admin;
    let mut ledger = Ledger::new(LedgerConfig {
        chain_id: params.chain_id,
        admin,
        trusted_forwarder: params.trusted_forwarder,
    })?;

    for name in &params.candidates {
        ledger.add_candidate(&admin, name)?;
    }

    Ok(ledger)
}
