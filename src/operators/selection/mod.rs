//! Selectors: operators that form the next population from scored
//! groups.  Selection moves designs out of the source groups; selectors
//! that allow the same design to win more than once duplicate it through
//! the target's clone allocator instead.

pub mod below_limit;
pub mod roulette;

pub use below_limit::BelowLimitSelector;
pub use roulette::RouletteWheelSelector;

use crate::design::DesignGroup;
use crate::design::DesignTarget;
use crate::error::{ContractError, Error, handle_failure};
use crate::fitness::FitnessRecord;

/// The reserved user attribute bit selectors use to mark chosen designs
/// before the post-pass sweep.
pub(crate) const SELECTION_ATTRIBUTE: usize = crate::design::FIRST_USER_ATTRIBUTE;

/// Moves the `n` designs with the highest fitness out of `from` into a
/// new objective-sorted group, breaking fitness ties on the design id.
/// A design without a fitness entry is a contract violation.
pub fn select_n_best(
    from: &mut [DesignGroup],
    n: usize,
    fitnesses: &FitnessRecord,
    _target: &DesignTarget,
) -> Result<DesignGroup, Error> {
    let mut ranked: Vec<(f64, u64, usize)> = Vec::new();
    for (gidx, group) in from.iter().enumerate() {
        for design in group.iter_of() {
            let fitness = fitnesses.fitness_of(design).ok_or_else(|| {
                handle_failure(Error::Contract(ContractError::MissingFitness {
                    design_id: design.id(),
                }))
            })?;
            ranked.push((fitness, design.id(), gidx));
        }
    }
    // Descending fitness, ascending id on ties.
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut best = DesignGroup::new();
    for (_, id, gidx) in ranked.into_iter().take(n) {
        let design = from[gidx]
            .take_by_id(id)
            .expect("ranked ids come from the groups");
        best.insert(design);
    }
    Ok(best)
}
