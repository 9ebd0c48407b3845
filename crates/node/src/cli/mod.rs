use crate::{
    NodeConfig, Snapshot, Store,
    config::expand_home_in_path,
    keys::{generate_key, load_key},
};
use ezballot_core::{
    Clock, Identity, IntentAction, LedgerConfig, LedgerId, Receipt, Relay, ReplayGuard, Runtime,
    SignedIntent, SystemClock, Tally,
    genesis::{GenesisParams, create_genesis},
};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use confique::Config;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Re-export PartialNodeConfig for public usage
pub use crate::config::confique_node_config_layer::NodeConfigLayer as PartialNodeConfig;


#[derive(Parser)]
#[command(name = "ezballot")]
#[command(about = "A voting ledger with a gasless meta-transaction relay")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "$HOME/.ezballot/config.toml")]
    config_path: PathBuf,

    /// Configuration object
    #[command(flatten)]
    config: PartialNodeConfig,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Internal helper struct that holds the resolved configuration
pub struct ResolvedCli {
    config_path: PathBuf,
    config: NodeConfig,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key file and print its identity
    Keygen {
        /// Where to write the secret key
        #[arg(long)]
        out: PathBuf,
    },
    /// Create a new ledger from the configuration
    Init {
        /// Initial candidates, registered in order
        #[arg(long = "candidate")]
        candidates: Vec<String>,
        /// Replace an existing ledger snapshot
        #[arg(long)]
        force: bool,
    },
    /// Register a candidate (admin only)
    AddCandidate {
        /// Caller's secret key
        #[arg(long)]
        key: PathBuf,
        name: String,
    },
    /// Cast a vote directly
    Vote {
        /// Voter's secret key
        #[arg(long)]
        key: PathBuf,
        candidate_id: u64,
    },
    /// Sign an intent for a relayer to submit, printed as JSON
    Sign {
        /// Voter's secret key
        #[arg(long)]
        key: PathBuf,
        /// Defaults to the next nonce recorded in the local snapshot
        #[arg(long)]
        nonce: Option<u64>,
        /// Seconds until the intent expires
        #[arg(long)]
        ttl: Option<u64>,
        #[command(subcommand)]
        action: IntentCommand,
    },
    /// Submit a signed intent with the configured relayer key
    Relay {
        /// JSON file produced by `ezballot sign`
        intent: PathBuf,
    },
    /// Print candidates, counts, total and leader
    Tally,
    /// Print whether an identity has voted and its next nonce
    Status { identity: Identity },
}

#[derive(Subcommand, Clone)]
enum IntentCommand {
    Vote { candidate_id: u64 },
    AddCandidate { name: String },
}

impl From<IntentCommand> for IntentAction {
    fn from(command: IntentCommand) -> Self {
        match command {
            IntentCommand::Vote { candidate_id } => IntentAction::Vote { candidate_id },
            IntentCommand::AddCandidate { name } => IntentAction::AddCandidate { name },
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Status {
    pub identity: Identity,
    pub has_voted: bool,
    pub next_nonce: u64,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(format!(
                "ezballot_core={0},ezballot_node={0},{0}",
                log_level
            ))
            .with_writer(std::io::stderr)
            .init();

        let command = self.command;
        let resolved_cli = ResolvedCli::resolve(&self.config_path, self.config)?;
        resolved_cli.handle_command(command)
    }
}

impl ResolvedCli {
    /// Load the configuration and resolve all $HOME placeholders
    fn resolve(config_path: &Path, partial: PartialNodeConfig) -> Result<Self> {
        let config_path = expand_home_in_path(config_path)?;

        let config = NodeConfig::builder()
            .preloaded(partial)
            .env()
            .file(&config_path)
            .load()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
            .with_resolved_paths()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Keygen { out } => {
                let identity = self.keygen(&expand_home_in_path(&out)?)?;
                println!("{identity}");
            }
            Commands::Init { candidates, force } => {
                let ledger_id = self.init(candidates, force)?;
                println!("{ledger_id}");
            }
            Commands::AddCandidate { key, name } => {
                let id = self.add_candidate(&key, &name)?;
                println!("{id}");
            }
            Commands::Vote { key, candidate_id } => {
                let vote_count = self.vote(&key, candidate_id)?;
                println!("{vote_count}");
            }
            Commands::Sign {
                key,
                nonce,
                ttl,
                action,
            } => {
                let intent = self.sign(&key, nonce, ttl, action.into())?;
                println!("{}", serde_json::to_string_pretty(&intent)?);
            }
            Commands::Relay { intent } => {
                let receipt = self.relay(&intent)?;
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
            Commands::Tally => print_tally(&self.tally()?),
            Commands::Status { identity } => {
                println!("{}", serde_json::to_string_pretty(&self.status(&identity)?)?);
            }
        }
        Ok(())
    }

    fn store(&self) -> Store {
        Store::new(&self.config.storage.state_path)
    }

    /// Immutable ledger configuration as the current settings describe it. The
    /// trusted forwarder falls back to the local relayer key when one exists.
    fn ledger_config(&self) -> Result<LedgerConfig> {
        let admin = self
            .config
            .admin()?
            .ok_or_else(|| {
                anyhow!("ledger.admin must be set (config file, EZBALLOT_ADMIN or --admin)")
            })?;

        let trusted_forwarder = match self.config.trusted_forwarder()? {
            Some(forwarder) => Some(forwarder),
            None if self.config.relay.key_path.exists() => {
                Some(Identity::from(&load_key(&self.config.relay.key_path)?))
            }
            None => None,
        };

        Ok(LedgerConfig {
            chain_id: self.config.ledger.chain_id.clone(),
            admin,
            trusted_forwarder,
        })
    }

    /// Resume the persisted ledger behind a relay acting as `gateway`. Direct
    /// calls never go through the relay, so any identity will do for them.
    fn open(&self, gateway: Option<Identity>) -> Result<Runtime> {
        let Snapshot { ledger, guard } = self.store().load()?;
        let gateway = gateway
            .or_else(|| ledger.trusted_forwarder().copied())
            .unwrap_or(*ledger.admin());
        let relay = Relay::with_guard(gateway, guard, Box::new(SystemClock));
        Ok(Runtime::new(ledger, relay))
    }

    fn persist(&self, runtime: &Runtime) -> Result<()> {
        let (ledger, guard) = runtime.snapshot();
        self.store().save(&Snapshot { ledger, guard })
    }

    pub fn keygen(&self, out: &Path) -> Result<Identity> {
        let key = generate_key(out)?;
        Ok(Identity::from(&key))
    }

    pub fn init(&self, candidates: Vec<String>, force: bool) -> Result<LedgerId> {
        let store = self.store();
        if store.exists() && !force {
            bail!(
                "A ledger already exists at {} (use --force to replace it)",
                store.path().display()
            );
        }

        let LedgerConfig {
            chain_id,
            admin,
            trusted_forwarder,
        } = self.ledger_config()?;
        if trusted_forwarder.is_none() {
            warn!("No trusted forwarder configured, relayed intents will be refused");
        }
        self.pin_ledger_config(&admin, trusted_forwarder.as_ref())?;

        let ledger = create_genesis(GenesisParams {
            chain_id,
            admin,
            trusted_forwarder,
            candidates,
        })?;
        let ledger_id = *ledger.id();
        store.save(&Snapshot {
            ledger,
            guard: ReplayGuard::new(),
        })?;

        info!("Initialized ledger {} at {}", ledger_id, store.path().display());
        Ok(ledger_id)
    }

    /// Write the settings the ledger was created with, so later commands on this
    /// machine derive the same ledger id. An existing config file is left alone.
    fn pin_ledger_config(&self, admin: &Identity, forwarder: Option<&Identity>) -> Result<()> {
        if self.config_path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config = self.config.clone();
        config.ledger.admin = Some(admin.to_hex());
        config.ledger.trusted_forwarder = forwarder.map(Identity::to_hex);
        config
            .save(&self.config_path)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        info!("Wrote configuration to {}", self.config_path.display());
        Ok(())
    }

    pub fn add_candidate(&self, key: &Path, name: &str) -> Result<u64> {
        let key = load_key(key)?;
        let runtime = self.open(None)?;
        let id = runtime.add_candidate(&key, name)?;
        self.persist(&runtime)?;
        Ok(id)
    }

    pub fn vote(&self, key: &Path, candidate_id: u64) -> Result<u64> {
        let key = load_key(key)?;
        let runtime = self.open(None)?;
        let vote_count = runtime.vote(&key, candidate_id)?;
        self.persist(&runtime)?;
        Ok(vote_count)
    }

    pub fn sign(
        &self,
        key: &Path,
        nonce: Option<u64>,
        ttl: Option<u64>,
        action: IntentAction,
    ) -> Result<SignedIntent> {
        let key = load_key(key)?;
        let voter = Identity::from(&key);

        let store = self.store();
        let (ledger_id, next_nonce) = if store.exists() {
            let runtime = self.open(None)?;
            (runtime.ledger_id(), runtime.next_nonce(&voter))
        } else {
            (self.ledger_config()?.ledger_id()?, 0)
        };

        let expiry = ttl.map(|ttl| SystemClock.now().saturating_add(ttl));
        let nonce = nonce.unwrap_or(next_nonce);
        let intent = SignedIntent::sign(&key, &ledger_id, action, nonce, expiry)?;
        Ok(intent)
    }

    /// The snapshot is saved even when the ledger rejects the action, since the
    /// intent's nonce has been consumed.
    pub fn relay(&self, intent_path: &Path) -> Result<Receipt> {
        let content = std::fs::read_to_string(intent_path)
            .with_context(|| format!("Failed to read intent {}", intent_path.display()))?;
        let intent: SignedIntent = serde_json::from_str(&content)
            .with_context(|| format!("Malformed intent {}", intent_path.display()))?;

        let relayer = load_key(&self.config.relay.key_path)?;
        let runtime = self.open(Some(Identity::from(&relayer)))?;
        let result = runtime.relay(&intent);
        self.persist(&runtime)?;
        Ok(result?)
    }

    pub fn tally(&self) -> Result<Tally> {
        Ok(self.open(None)?.tally())
    }

    pub fn status(&self, identity: &Identity) -> Result<Status> {
        let runtime = self.open(None)?;
        Ok(Status {
            identity: *identity,
            has_voted: runtime.has_voted(identity),
            next_nonce: runtime.next_nonce(identity),
        })
    }
}

fn print_tally(tally: &Tally) {
    for entry in tally.entries() {
        let share = tally.share(entry.id).unwrap_or(0.0);
        println!("{:>4}  {:<24} {:>8}  {:5.1}%", entry.id, entry.name, entry.votes, share);
    }
    println!("total: {}", tally.total_votes());
    match tally.leader() {
        Some(leader) => println!("leader: {} ({})", leader.name, leader.votes),
        None => println!("leader: none"),
    }
}
