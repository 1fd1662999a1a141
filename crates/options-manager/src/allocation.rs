//! Capital allocation: turn a regime's allocation fraction into a contract count.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Size a new position from account equity.
///
/// `quantity = floor(equity * allocation_fraction / (option_price * multiplier))`.
/// Sizes that do not fit a `u32` or a `Decimal` are rejected.
pub fn size_position(
    account_equity: Decimal,
    allocation_fraction: Decimal,
    option_price: Decimal,
    multiplier: Decimal,
) -> AllocationCheck {
    let allocation_usd = account_equity.saturating_mul(allocation_fraction);
    let cost_per_contract = option_price.saturating_mul(multiplier);

    if account_equity <= Decimal::ZERO || cost_per_contract <= Decimal::ZERO {
        return AllocationCheck::Rejected {
            allocation_usd,
            cost_per_contract,
        };
    }

    let quantity = allocation_usd
        .checked_div(cost_per_contract)
        .and_then(|contracts| contracts.floor().to_u32())
        .unwrap_or(0);

    if quantity < 1 {
        AllocationCheck::Rejected {
            allocation_usd,
            cost_per_contract,
        }
    } else {
        AllocationCheck::Approved {
            quantity,
            allocation_usd,
            committed_usd: cost_per_contract.saturating_mul(Decimal::from(quantity)),
        }
    }
}

/// Result of sizing a new position.
#[derive(Debug, PartialEq, Eq)]
pub enum AllocationCheck {
    Approved {
        quantity: u32,
        allocation_usd: Decimal,
        committed_usd: Decimal,
    },
    /// Allocation does not cover a single contract.
    Rejected {
        allocation_usd: Decimal,
        cost_per_contract: Decimal,
    },
}
