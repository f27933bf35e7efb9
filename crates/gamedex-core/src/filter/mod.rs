//! # Filters and reports
//!
//! Rule trees over games, the per-pass [`FilterContext`] they evaluate
//! against, and [`run_report`] which evaluates a tree over a working set.

mod context;
mod game;
mod report;
mod rule;

pub use context::{AdditionalInfo, FileSizeProvider, FilterContext, RuleFinding};
pub use game::{Game, GameId, Platform, ProviderHeader};
pub use report::{run_report, ReportResult};
pub use rule::{Filter, RuleKind};
