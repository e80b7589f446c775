// src/pos/governance.rs

//! Block-level tallies of halt and commission price votes.

use tracing::info;

use crate::error::TxError;
use crate::events::Event;
use crate::pos::validators::ValidatorSet;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::types::{Amount, PubKey};

fn power_of(set: &ValidatorSet, voters: &[PubKey]) -> Amount {
    voters
        .iter()
        .filter_map(|pk| set.get(pk))
        .fold(0u128, |acc, v| acc.saturating_add(v.total_bip_stake))
}

fn is_supermajority(voted: Amount, total: Amount) -> bool {
    total > 0 && voted.saturating_mul(3) >= total.saturating_mul(2)
}

/// Consumes the halt votes for `height`; true when validators holding at
/// least two thirds of the power asked to halt here.
pub fn apply_halt_votes(state: &mut State, height: u64) -> Result<bool, TxError> {
    let votes = state.halts.take(height)?;
    if votes.is_empty() {
        return Ok(false);
    }
    let set = state.validators.get()?;
    let voted = power_of(&set, &votes);
    let halt = is_supermajority(voted, set.total_power());
    if halt {
        info!(height, voters = votes.len(), "halt height reached");
    }
    Ok(halt)
}

/// Consumes the price votes for `height` and switches the table when
/// identical votes reach two thirds of the validator power.
pub fn apply_price_votes(state: &mut State, height: u64, events: &mut Vec<Event>) -> Result<bool, TxError> {
    let votes = state.commission.take_votes(height)?;
    if votes.is_empty() {
        return Ok(false);
    }
    let set = state.validators.get()?;
    let total = set.total_power();

    let mut groups: Vec<(PriceTable, Vec<PubKey>)> = Vec::new();
    for vote in votes {
        match groups.iter_mut().find(|(table, _)| *table == vote.prices) {
            Some((_, voters)) => voters.push(vote.pubkey),
            None => groups.push((vote.prices, vec![vote.pubkey])),
        }
    }

    for (table, voters) in groups {
        if is_supermajority(power_of(&set, &voters), total) {
            state.commission.set_prices(table);
            events.push(Event::CommissionPricesUpdated { height });
            info!(height, voters = voters.len(), "commission price table updated");
            return Ok(true);
        }
    }
    Ok(false)
}
