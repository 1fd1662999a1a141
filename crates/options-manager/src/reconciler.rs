//! Startup and per-cycle reconciliation of persisted state against the broker.

use tracing::{error, info, warn};

use sentinel_broker::{BrokerError, ContractIdentity, Holding};
use sentinel_core::Severity;

use crate::closer::{close_contract, CloseOutcome};
use crate::session::Session;
use crate::types::{CloseReason, Position, ProfitTargets};

/// What reconciliation decided for this cycle.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// Persisted position is live; monitoring resumes with rebuilt targets.
    Resume {
        position: Position,
        targets: ProfitTargets,
    },
    /// Persisted contract no longer resolves. State was cleared.
    Cleared { contract: ContractIdentity },
    /// Broker held positions with no persisted record. Each got one close attempt.
    GhostsClosed { found: usize, closed: usize },
    /// Nothing persisted and nothing held. New entries may be considered.
    Flat,
}

/// Targets for a resumed position.
///
/// Rebuilt from the regime and the persisted `trailing_percent`, which may
/// already be tightened, so the lock can never loosen across a restart.
#[must_use]
pub fn rebuild_targets(session: &Session, position: &Position) -> ProfitTargets {
    let mut targets = session.config.regimes.targets_for(position.regime);
    targets.tightened_stop_pct = targets.tightened_stop_pct.min(position.trailing_percent);
    targets
}

/// Runs one reconciliation pass.
///
/// # Errors
///
/// Broker request failures are returned so the supervisor can abort the
/// cycle. State is never modified in that case.
pub async fn reconcile(session: &Session) -> Result<ReconcileOutcome, BrokerError> {
    match session.store.load_checked() {
        Ok(Some(position)) => resume(session, position).await,
        Ok(None) => sweep_ghosts(session).await,
        Err(e) => {
            warn!(path = %session.store.path().display(), error = %e, "Persisted state unreadable, treating as flat");
            session
                .alert(
                    Severity::Warning,
                    "State Corrupted",
                    &format!(
                        "Could not read {}: {e}. Treating the account as flat.",
                        session.store.path().display()
                    ),
                )
                .await;
            if let Err(e) = session.store.clear() {
                error!(error = %e, "Failed to reset corrupted state file");
            }
            sweep_ghosts(session).await
        }
    }
}

async fn resume(session: &Session, mut position: Position) -> Result<ReconcileOutcome, BrokerError> {
    let name = position.contract_identity.display_name();
    info!(
        contract = %name,
        regime = %position.regime,
        entry = %position.entry_price,
        highest = %position.highest_price,
        trailing_pct = %position.trailing_percent,
        breakeven = position.breakeven_activated,
        profit_lock = position.profit_lock_activated,
        "Recovered open position from state"
    );

    let Some(resolved) = session.broker.resolve(&position.contract_identity).await? else {
        error!(contract = %name, "Persisted contract no longer resolves, clearing state");
        session
            .alert(
                Severity::Critical,
                &format!("Contract Not Found - {name}"),
                &format!(
                    "{name} could not be re-qualified with the broker. \
                     Assuming the position expired or closed; state cleared."
                ),
            )
            .await;
        if let Err(e) = session.store.clear() {
            error!(error = %e, "Failed to clear state for unresolvable contract");
        }
        return Ok(ReconcileOutcome::Cleared {
            contract: position.contract_identity,
        });
    };

    if resolved.con_id.is_some() && resolved.con_id != position.contract_identity.con_id {
        position.contract_identity.con_id = resolved.con_id;
        if let Err(e) = session.store.persist(&position) {
            warn!(contract = %name, error = %e, "Failed to persist resolved contract id");
        }
    }

    let targets = rebuild_targets(session, &position);
    info!(
        contract = %name,
        target_1 = %targets.target_1_gain_pct,
        target_2 = %targets.target_2_gain_pct,
        tightened = %targets.tightened_stop_pct,
        "Resuming position monitoring"
    );
    Ok(ReconcileOutcome::Resume { position, targets })
}

fn is_ghost(session: &Session, holding: &Holding) -> bool {
    holding.quantity != 0
        && holding
            .contract
            .symbol
            .eq_ignore_ascii_case(&session.config.universe.symbol)
}

async fn sweep_ghosts(session: &Session) -> Result<ReconcileOutcome, BrokerError> {
    let ghosts: Vec<Holding> = session
        .broker
        .positions()
        .await?
        .into_iter()
        .filter(|h| is_ghost(session, h))
        .collect();

    if ghosts.is_empty() {
        return Ok(ReconcileOutcome::Flat);
    }

    let found = ghosts.len();
    let mut closed = 0;
    for ghost in &ghosts {
        let name = ghost.contract.display_name();
        warn!(contract = %name, quantity = ghost.quantity, "Ghost position detected, force closing");
        session
            .alert(
                Severity::Critical,
                &format!("Ghost Position Detected - {name}"),
                &format!(
                    "Broker reports {} x {name} with no persisted record. Submitting a close order.",
                    ghost.quantity
                ),
            )
            .await;

        match close_contract(session, &ghost.contract, CloseReason::GhostPosition).await? {
            CloseOutcome::Filled(_) | CloseOutcome::AlreadyFlat => closed += 1,
            CloseOutcome::NotFilled { .. } => {}
        }
    }

    info!(found, closed, "Ghost sweep finished");
    Ok(ReconcileOutcome::GhostsClosed { found, closed })
}
