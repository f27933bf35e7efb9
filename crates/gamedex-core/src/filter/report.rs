//! Running a filter over a working set as a report.

use super::context::{AdditionalInfo, FilterContext};
use super::game::{Game, GameId};
use super::rule::Filter;
use indexmap::IndexSet;
use std::collections::HashMap;

/// Outcome of one report pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    /// Matching games, in working-set order
    pub games: Vec<Game>,
    /// Findings rules attached while evaluating, keyed by game
    pub additional_info: HashMap<GameId, IndexSet<AdditionalInfo>>,
}

impl ReportResult {
    /// Findings attached to `id`.
    pub fn info_for(&self, id: GameId) -> impl Iterator<Item = &AdditionalInfo> {
        self.additional_info.get(&id).into_iter().flatten()
    }
}

/// Evaluate `filter` against every game in `ctx`, consuming the context.
pub fn run_report(filter: &Filter, ctx: FilterContext) -> ReportResult {
    let games: Vec<Game> = ctx
        .games()
        .iter()
        .filter(|game| filter.evaluate(game, &ctx))
        .cloned()
        .collect();
    tracing::debug!(
        matched = games.len(),
        total = ctx.games().len(),
        "report evaluated"
    );
    ReportResult {
        games,
        additional_info: ctx.into_additional_info(),
    }
}
