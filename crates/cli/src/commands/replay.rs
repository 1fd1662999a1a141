//! Replay CLI command.
//!
//! Paper-trades one position against a recorded tick file. The position goes
//! through the same supervision cycle as live trading (reconcile, monitor,
//! close) with the paper broker standing in for the real one. The market
//! counts as open while ticks remain, so an exhausted file ends in an
//! end-of-day flatten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use sentinel_broker::{ContractIdentity, OptionRight, PaperBroker, QuoteSnapshot};
use sentinel_core::{LogNotifier, MarketClock};
use sentinel_options_manager::{
    EntrySignal, ManagerConfig, NoSignals, Position, Regime, Session, SignalSource, Supervisor,
};

/// Arguments for the replay command.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Tick CSV with header `last,bid,ask,volume` (any field may be empty)
    #[arg(long)]
    pub prices: PathBuf,

    /// Option expiry (YYYY-MM-DD)
    #[arg(long)]
    pub expiry: NaiveDate,

    /// Option strike
    #[arg(long)]
    pub strike: Decimal,

    /// Option right (C or P)
    #[arg(long)]
    pub right: OptionRight,

    /// Regime fixed at entry
    #[arg(long, default_value = "trend")]
    pub regime: Regime,

    /// Start from an already-open position at this price instead of entering
    /// on the first tick
    #[arg(long)]
    pub entry_price: Option<Decimal>,

    /// Contracts held when starting from --entry-price
    #[arg(long, default_value_t = 1)]
    pub quantity: u32,

    /// Paper account equity used for sizing new entries
    #[arg(long, default_value = "100000")]
    pub equity: Decimal,

    /// Config file. Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Scratch state file for the replay
    #[arg(long, default_value = "replay_state.json")]
    pub state: PathBuf,
}

/// One CSV row.
#[derive(Debug, Deserialize)]
struct TickRow {
    last: Option<Decimal>,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    volume: Option<u64>,
}

impl From<TickRow> for QuoteSnapshot {
    fn from(row: TickRow) -> Self {
        Self {
            last: row.last,
            bid: row.bid,
            ask: row.ask,
            volume: row.volume,
        }
    }
}

/// Reads a tick file into quote snapshots, oldest first.
pub fn read_ticks(path: &Path) -> Result<Vec<QuoteSnapshot>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open tick file {}", path.display()))?;

    reader
        .deserialize::<TickRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map(QuoteSnapshot::from)
                .with_context(|| format!("bad tick on line {}", i + 2))
        })
        .collect()
}

/// Market is open while the paper broker still has ticks to serve.
struct ReplayClock {
    broker: Arc<PaperBroker>,
    contract: ContractIdentity,
}

impl MarketClock for ReplayClock {
    fn is_open(&self) -> bool {
        self.broker.remaining_quotes(&self.contract) > 0
    }
}

/// Offers the replayed contract as the entry signal.
struct ReplaySignal(EntrySignal);

#[async_trait]
impl SignalSource for ReplaySignal {
    async fn next_signal(&self) -> Result<Option<EntrySignal>> {
        Ok(Some(self.0.clone()))
    }
}

/// Runs the replay command.
///
/// # Errors
/// Returns an error for an unreadable tick file or config, or if the
/// scratch state path is the live state file.
pub async fn run_replay(args: ReplayArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default(),
    };
    if args.state == config.state.path {
        bail!(
            "replay state {} is the live state file; pass a different --state",
            args.state.display()
        );
    }
    config.state.path = args.state.clone();
    config.monitor.poll_interval_secs = 0;

    let ticks = read_ticks(&args.prices)?;
    if ticks.is_empty() {
        bail!("tick file {} has no rows", args.prices.display());
    }

    let broker = Arc::new(PaperBroker::new(args.equity));
    let contract = broker.list_contract(ContractIdentity::new(
        &config.universe.symbol,
        args.expiry,
        args.strike,
        args.right,
    ));
    broker.push_quotes(&contract, ticks.iter().cloned());

    let clock = Arc::new(ReplayClock {
        broker: broker.clone(),
        contract: contract.clone(),
    });
    let session = Session::paper(broker.clone(), clock, Arc::new(LogNotifier), config);
    session.store.clear()?;

    let signals: Arc<dyn SignalSource> = match args.entry_price {
        Some(entry) => {
            let trailing = session.config.regimes.select(args.regime).initial_trailing_pct;
            broker.set_holding(&contract, i32::try_from(args.quantity)?, entry);
            session.store.persist(&Position::opened(
                contract.clone(),
                entry,
                args.quantity,
                trailing,
                args.regime,
            ))?;
            Arc::new(NoSignals)
        }
        None => Arc::new(ReplaySignal(EntrySignal {
            contract: contract.clone(),
            regime: args.regime,
            rationale: format!("replay of {}", args.prices.display()),
        })),
    };

    info!(
        contract = %contract.display_name(),
        ticks = ticks.len(),
        regime = %args.regime,
        "Starting replay"
    );
    let supervisor = Supervisor::new(session, signals);
    let outcome = supervisor.run_cycle().await?;

    println!("Outcome: {outcome:?}");
    println!(
        "Ticks consumed: {}/{}",
        ticks.len() - broker.remaining_quotes(&contract),
        ticks.len()
    );
    for (i, order) in broker.orders().iter().enumerate() {
        println!(
            "Order {}: {} {} x{}",
            i + 1,
            order.side,
            order.contract.display_name(),
            order.quantity
        );
    }
    match supervisor.session().store.load() {
        Some(position) => println!("Position still open: {position:?}"),
        None => println!("Flat"),
    }
    Ok(())
}
