//! Singularity-budget search over constraint ratios.
//!
//! Islands over budget at the default ratio try a sequence of relaxed ratios
//! whose lower bound grows by a fixed step. Every (island, ratio) pair is
//! evaluated independently; afterwards each island takes the least relaxed
//! ratio that meets the budget.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::algo::observer::{Checkpoint, Observer};
use crate::algo::parameterize::{HeightLimit, Parameterizer};

use super::task::{FailureReason, IslandStage, IslandTask};
use super::AutoRemeshOptions;

/// Slack for floating-point drift when comparing ratio bounds.
const RATIO_EPSILON: f64 = 1e-9;

/// Relaxed ratios `(lo + k * step, hi)` for `k = 1, 2, ...` while the lower
/// bound stays below `hi`, in increasing order.
///
/// `step` must be positive.
pub fn budget_candidates(default_ratio: (f64, f64), step: f64) -> Vec<(f64, f64)> {
    let (lo, hi) = default_ratio;
    (1_usize..)
        .map(|k| lo + k as f64 * step)
        .take_while(|&candidate| candidate + RATIO_EPSILON < hi)
        .map(|candidate| (candidate, hi))
        .collect()
}

/// Outcome of evaluating one ratio for one island.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    /// Position of the island's task.
    pub task: usize,
    pub ratio: (f64, f64),
    pub limit: HeightLimit,
    /// `None` when the count-only solve failed.
    pub singularities: Option<usize>,
}

/// Evaluate every candidate ratio for every island that needs a search.
///
/// Tasks are only read; results come back in task order, then ratio order.
pub(crate) fn evaluate_candidates<P: Parameterizer>(
    tasks: &[IslandTask<P>],
    ratios: &[(f64, f64)],
    parallel: bool,
    observer: &Observer,
) -> Vec<Candidate> {
    let pairs: Vec<(usize, usize)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.stage == IslandStage::NeedsSearch)
        .flat_map(|(t, _)| (0..ratios.len()).map(move |r| (t, r)))
        .collect();

    let evaluate = |&(t, r): &(usize, usize)| -> Option<Candidate> {
        let task = &tasks[t];
        let parameterizer = task.parameterizer.as_ref()?;
        let ratio = ratios[r];
        let limit = parameterizer.limit_relative_height(ratio);
        let constraints = parameterizer.prepare_constraints(limit);

        let singularities = match parameterizer.count_singularities(&constraints) {
            Ok(count) => {
                log::debug!("island {}: ratio {:.3} -> {} singularities", task.island, ratio.0, count);
                observer.notify(&Checkpoint::SingularityEvaluated {
                    island: task.island,
                    ratio,
                    singularities: count,
                });
                Some(count)
            }
            Err(err) => {
                log::debug!("island {}: ratio {:.3} failed: {}", task.island, ratio.0, err);
                None
            }
        };

        Some(Candidate {
            task: t,
            ratio,
            limit,
            singularities,
        })
    };

    if parallel {
        pairs.par_iter().filter_map(evaluate).collect()
    } else {
        pairs.iter().filter_map(evaluate).collect()
    }
}

/// For each task, the first candidate in increasing ratio order whose count
/// is within `budget`.
pub(crate) fn select_least_relaxed(candidates: &[Candidate], budget: usize) -> BTreeMap<usize, &Candidate> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| a.task.cmp(&b.task).then(a.ratio.0.total_cmp(&b.ratio.0)));

    let mut chosen = BTreeMap::new();
    for candidate in ordered {
        if candidate.singularities.is_some_and(|count| count <= budget) {
            chosen.entry(candidate.task).or_insert(candidate);
        }
    }
    chosen
}

/// Run the budget search for all islands marked [`IslandStage::NeedsSearch`].
///
/// Islands without a satisfying ratio fail with
/// [`FailureReason::SingularityBudget`].
pub(crate) fn run_budget_search<P: Parameterizer>(
    tasks: &mut [IslandTask<P>],
    options: &AutoRemeshOptions,
    observer: &Observer,
) {
    let pending = tasks
        .iter()
        .filter(|task| task.stage == IslandStage::NeedsSearch)
        .count();
    if pending == 0 {
        return;
    }

    let ratios = budget_candidates(options.constraint_ratio, options.ratio_step);
    log::info!(
        "singularity budget search: {} islands, {} candidate ratios each",
        pending,
        ratios.len()
    );

    let candidates = evaluate_candidates(tasks, &ratios, options.parallel, observer);
    let chosen = select_least_relaxed(&candidates, options.max_singularity_count);

    for (index, task) in tasks.iter_mut().enumerate() {
        if task.stage != IslandStage::NeedsSearch {
            continue;
        }
        match chosen.get(&index).and_then(|c| c.singularities.map(|count| (c, count))) {
            Some((candidate, count)) => {
                log::debug!(
                    "island {}: accepted ratio {:.3} with {} singularities",
                    task.island,
                    candidate.ratio.0,
                    count
                );
                task.accept_candidate(candidate.ratio, candidate.limit, count);
            }
            None => task.fail(FailureReason::SingularityBudget),
        }
    }
}
