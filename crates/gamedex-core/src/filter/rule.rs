//! Filter rule trees
//!
//! A [`Filter`] is a boolean expression over a [`Game`]. Leaves are rules;
//! inner nodes are `And`, `Or` and `Not`. Negation is pushed down to the
//! leaves through [`Filter::evaluate_not`], so rules that cannot answer for a
//! game (a missing score, an excluded provider) reject it under both
//! polarities instead of flipping to a match.

use super::context::{FilterContext, RuleFinding};
use super::game::{Game, GameId, Platform};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identifies which kind of rule produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum RuleKind {
    True,
    CriticScore,
    UserScore,
    AvgScore,
    MinScore,
    MaxScore,
    NullCriticScore,
    NullUserScore,
    NullAvgScore,
    Platform,
    Genre,
    Tag,
    Provider,
    FileSize,
    Duplications,
    NameDiff,
}

/// Boolean expression over a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Filter {
    /// Both sides match.
    And {
        /// Left operand
        left: Box<Filter>,
        /// Right operand
        right: Box<Filter>,
    },
    /// Either side matches.
    Or {
        /// Left operand
        left: Box<Filter>,
        /// Right operand
        right: Box<Filter>,
    },
    /// The target does not match.
    Not {
        /// Negated expression
        target: Box<Filter>,
    },
    /// Matches everything.
    #[default]
    True,
    /// Critic score is at least `score`.
    CriticScore {
        /// Threshold
        score: f64,
    },
    /// User score is at least `score`.
    UserScore {
        /// Threshold
        score: f64,
    },
    /// Average of the available scores is at least `score`.
    AvgScore {
        /// Threshold
        score: f64,
    },
    /// Lowest available score is at least `score`.
    MinScore {
        /// Threshold
        score: f64,
    },
    /// Highest available score is at least `score`.
    MaxScore {
        /// Threshold
        score: f64,
    },
    /// Game has no critic score.
    NullCriticScore,
    /// Game has no user score.
    NullUserScore,
    /// Game has no score at all.
    NullAvgScore,
    /// Game runs on `platform`.
    Platform {
        /// Required platform
        platform: Platform,
    },
    /// Game has `genre`.
    Genre {
        /// Required genre
        genre: String,
    },
    /// Game is tagged `tag`.
    Tag {
        /// Required tag
        tag: String,
    },
    /// Game was synced from `provider_id`.
    Provider {
        /// Required provider
        #[serde(rename = "providerId")]
        provider_id: String,
    },
    /// Game folder is at least `target` bytes.
    #[serde(rename = "size")]
    FileSize {
        /// Threshold in bytes
        target: u64,
    },
    /// Another game on the same platform shares a provider entry with this one.
    Duplications,
    /// The folder name disagrees with the name some provider reports.
    NameDiff,
}

const DUPLICATIONS_KEY: &str = "duplications";

impl Filter {
    /// `self && other`
    pub fn and(self, other: Filter) -> Filter {
        Filter::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// `self || other`
    pub fn or(self, other: Filter) -> Filter {
        Filter::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// `!self`
    pub fn negate(self) -> Filter {
        Filter::Not {
            target: Box::new(self),
        }
    }

    /// Kind of this node if it is a rule, `None` for operators.
    pub fn rule_kind(&self) -> Option<RuleKind> {
        let kind = match self {
            Filter::And { .. } | Filter::Or { .. } | Filter::Not { .. } => return None,
            Filter::True => RuleKind::True,
            Filter::CriticScore { .. } => RuleKind::CriticScore,
            Filter::UserScore { .. } => RuleKind::UserScore,
            Filter::AvgScore { .. } => RuleKind::AvgScore,
            Filter::MinScore { .. } => RuleKind::MinScore,
            Filter::MaxScore { .. } => RuleKind::MaxScore,
            Filter::NullCriticScore => RuleKind::NullCriticScore,
            Filter::NullUserScore => RuleKind::NullUserScore,
            Filter::NullAvgScore => RuleKind::NullAvgScore,
            Filter::Platform { .. } => RuleKind::Platform,
            Filter::Genre { .. } => RuleKind::Genre,
            Filter::Tag { .. } => RuleKind::Tag,
            Filter::Provider { .. } => RuleKind::Provider,
            Filter::FileSize { .. } => RuleKind::FileSize,
            Filter::Duplications => RuleKind::Duplications,
            Filter::NameDiff => RuleKind::NameDiff,
        };
        Some(kind)
    }

    /// Whether `game` matches.
    pub fn evaluate(&self, game: &Game, ctx: &FilterContext) -> bool {
        match self {
            Filter::And { left, right } => left.evaluate(game, ctx) && right.evaluate(game, ctx),
            Filter::Or { left, right } => left.evaluate(game, ctx) || right.evaluate(game, ctx),
            Filter::Not { target } => target.evaluate_not(game, ctx),
            Filter::True => true,
            Filter::CriticScore { score } => game.critic_score.is_some_and(|s| s >= *score),
            Filter::UserScore { score } => game.user_score.is_some_and(|s| s >= *score),
            Filter::AvgScore { score } => game.avg_score().is_some_and(|s| s >= *score),
            Filter::MinScore { score } => game.min_score().is_some_and(|s| s >= *score),
            Filter::MaxScore { score } => game.max_score().is_some_and(|s| s >= *score),
            Filter::NullCriticScore => game.critic_score.is_none(),
            Filter::NullUserScore => game.user_score.is_none(),
            Filter::NullAvgScore => game.avg_score().is_none(),
            Filter::Platform { platform } => game.platform == *platform,
            Filter::Genre { genre } => game.genres.iter().any(|g| g == genre),
            Filter::Tag { tag } => game.tags.iter().any(|t| t == tag),
            Filter::Provider { provider_id } => {
                !game.is_provider_excluded(provider_id) && game.has_provider(provider_id)
            }
            Filter::FileSize { target } => ctx.size(game) >= *target,
            Filter::Duplications => {
                let all = ctx.cache(DUPLICATIONS_KEY, || find_duplications(ctx.games()));
                match all.get(&game.id) {
                    Some(findings) => {
                        ctx.add_additional_infos(
                            game,
                            RuleKind::Duplications,
                            findings.iter().cloned(),
                        );
                        true
                    }
                    None => false,
                }
            }
            Filter::NameDiff => {
                let diffs = name_diffs(game);
                let matched = !diffs.is_empty();
                ctx.add_additional_infos(game, RuleKind::NameDiff, diffs);
                matched
            }
        }
    }

    /// Whether `game` matches the negation of this filter.
    pub fn evaluate_not(&self, game: &Game, ctx: &FilterContext) -> bool {
        match self {
            Filter::And { left, right } => {
                left.evaluate_not(game, ctx) || right.evaluate_not(game, ctx)
            }
            Filter::Or { left, right } => {
                left.evaluate_not(game, ctx) && right.evaluate_not(game, ctx)
            }
            Filter::Not { target } => target.evaluate(game, ctx),
            Filter::CriticScore { score } => game.critic_score.is_some_and(|s| s < *score),
            Filter::UserScore { score } => game.user_score.is_some_and(|s| s < *score),
            Filter::AvgScore { score } => game.avg_score().is_some_and(|s| s < *score),
            Filter::MinScore { score } => game.min_score().is_some_and(|s| s < *score),
            Filter::MaxScore { score } => game.max_score().is_some_and(|s| s < *score),
            Filter::Provider { provider_id } => {
                !game.is_provider_excluded(provider_id) && !game.has_provider(provider_id)
            }
            _ => !self.evaluate(game, ctx),
        }
    }
}

/// Group games by shared provider entry within one platform.
fn find_duplications(games: &[Game]) -> HashMap<GameId, Vec<RuleFinding>> {
    let mut by_header: BTreeMap<(&str, &str, Platform), Vec<GameId>> = BTreeMap::new();
    for game in games {
        for header in &game.provider_headers {
            by_header
                .entry((
                    header.provider_id.as_str(),
                    header.api_url.as_str(),
                    game.platform,
                ))
                .or_default()
                .push(game.id);
        }
    }

    let mut result: HashMap<GameId, Vec<RuleFinding>> = HashMap::new();
    for ((provider_id, _, _), ids) in by_header.into_iter().filter(|(_, ids)| ids.len() > 1) {
        for &id in &ids {
            for &other in ids.iter().filter(|&&other| other != id) {
                result.entry(id).or_default().push(RuleFinding::Duplication {
                    provider_id: provider_id.to_string(),
                    duplicate_of: other,
                });
            }
        }
    }
    result
}

/// One finding per provider whose reported name would produce a different
/// folder name than the one on disk.
fn name_diffs(game: &Game) -> Vec<RuleFinding> {
    let Some(actual) = game.folder_name() else {
        return Vec::new();
    };
    let folder = FolderName::parse(actual);
    game.provider_headers
        .iter()
        .filter(|header| !game.is_provider_excluded(&header.provider_id))
        .filter_map(|header| {
            let expected = folder.with_name(&to_file_name(header.name.as_deref()?));
            (expected != actual).then(|| RuleFinding::NameDiff {
                provider_id: header.provider_id.clone(),
                actual_name: actual.to_string(),
                expected_name: expected,
            })
        })
        .collect()
}

/// A folder name split into `[order] ` prefix, game name and trailing
/// ` [tag]` groups.
#[derive(Debug, PartialEq, Eq)]
struct FolderName<'a> {
    prefix: &'a str,
    name: &'a str,
    suffix: &'a str,
}

impl<'a> FolderName<'a> {
    fn parse(raw: &'a str) -> Self {
        let prefix_len = raw
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .filter(|(order, _)| !order.is_empty() && order.chars().all(|c| c.is_ascii_digit()))
            .map_or(0, |(order, _)| order.len() + 3);
        let (prefix, rest) = raw.split_at(prefix_len);

        let mut name = rest;
        while let Some(open) = name.strip_suffix(']').and_then(|n| n.rfind(" [")) {
            name = &name[..open];
        }
        Self {
            prefix,
            name,
            suffix: &rest[name.len()..],
        }
    }

    fn with_name(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }
}

/// Turn a display name into something usable as a folder name.
fn to_file_name(name: &str) -> String {
    name.replace(": ", " - ")
        .chars()
        .filter(|&c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_string()
}
