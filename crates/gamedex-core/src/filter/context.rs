//! Per-pass filter evaluation context
//!
//! A [`FilterContext`] lives for exactly one evaluation pass over a working
//! set of games. It memoizes expensive intermediate results by key and
//! collects per-game findings that rules want to surface next to the result.
//!
//! The context is single-threaded: interior mutability is `RefCell`, shared
//! results are `Rc`. A pass that needs parallelism builds one context per
//! worker.

use super::game::{Game, GameId};
use super::rule::RuleKind;
use indexmap::IndexSet;
use serde::Serialize;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Something that can measure a game's folder on disk.
pub trait FileSizeProvider: Send + Sync {
    /// Total size of everything under `path`, in bytes.
    fn size(&self, path: &Path) -> u64;
}

impl<F> FileSizeProvider for F
where
    F: Fn(&Path) -> u64 + Send + Sync,
{
    fn size(&self, path: &Path) -> u64 {
        self(path)
    }
}

/// A finding attached to a game by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleFinding {
    /// Another game on the same platform was synced from the same provider entry.
    #[serde(rename_all = "camelCase")]
    Duplication {
        /// Provider whose entry is shared
        provider_id: String,
        /// The other game
        duplicate_of: GameId,
    },
    /// The folder name differs from what a provider's name for the game implies.
    #[serde(rename_all = "camelCase")]
    NameDiff {
        /// Provider whose name was used
        provider_id: String,
        /// Folder name on disk
        actual_name: String,
        /// Folder name the provider's name would produce
        expected_name: String,
    },
    /// Free-form note.
    Note {
        /// Note text
        text: String,
    },
}

/// One entry of a game's additional info: which rule produced which finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AdditionalInfo {
    /// Rule that produced the finding
    pub rule: RuleKind,
    /// The finding
    pub finding: RuleFinding,
}

/// Evaluation context for one filter pass.
pub struct FilterContext {
    games: Vec<Game>,
    sizes: Arc<dyn FileSizeProvider>,
    cache: RefCell<HashMap<String, Rc<dyn Any>>>,
    additional_info: RefCell<HashMap<GameId, IndexSet<AdditionalInfo>>>,
}

impl FilterContext {
    /// Create a context over `games`.
    pub fn new(games: Vec<Game>, sizes: Arc<dyn FileSizeProvider>) -> Self {
        Self {
            games,
            sizes,
            cache: RefCell::new(HashMap::new()),
            additional_info: RefCell::new(HashMap::new()),
        }
    }

    /// The working set for this pass.
    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Memoize `compute` under `key`.
    ///
    /// The first call for a key runs `compute` and stores the result; later
    /// calls return the stored result without running their closure.
    ///
    /// # Panics
    ///
    /// Panics if `key` was first cached with a different type.
    pub fn cache<T: 'static>(&self, key: &str, compute: impl FnOnce() -> T) -> Rc<T> {
        if let Some(existing) = self.cache.borrow().get(key) {
            return Self::downcast(key, Rc::clone(existing));
        }
        // `compute` may itself use the cache, so no borrow is held while it runs.
        let value: Rc<dyn Any> = Rc::new(compute());
        let stored = Rc::clone(
            self.cache
                .borrow_mut()
                .entry(key.to_string())
                .or_insert(value),
        );
        Self::downcast(key, stored)
    }

    fn downcast<T: 'static>(key: &str, value: Rc<dyn Any>) -> Rc<T> {
        match value.downcast::<T>() {
            Ok(value) => value,
            Err(_) => panic!(
                "filter cache key '{key}' holds a value of a different type than {}",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Size of the game's folder, measured once per pass.
    pub fn size(&self, game: &Game) -> u64 {
        let key = format!("size:{}", game.id.0);
        *self.cache(&key, || self.sizes.size(game.path()))
    }

    /// Attach a finding to `game`. Duplicate findings collapse.
    pub fn add_additional_info(&self, game: &Game, rule: RuleKind, finding: RuleFinding) {
        self.additional_info
            .borrow_mut()
            .entry(game.id)
            .or_default()
            .insert(AdditionalInfo { rule, finding });
    }

    /// Attach several findings to `game`.
    pub fn add_additional_infos(
        &self,
        game: &Game,
        rule: RuleKind,
        findings: impl IntoIterator<Item = RuleFinding>,
    ) {
        let mut infos = self.additional_info.borrow_mut();
        let entry = infos.entry(game.id).or_default();
        for finding in findings {
            entry.insert(AdditionalInfo { rule, finding });
        }
    }

    /// Findings attached to `id` so far, in insertion order.
    pub fn additional_info(&self, id: GameId) -> Vec<AdditionalInfo> {
        self.additional_info
            .borrow()
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Consume the context, returning every game's findings.
    pub fn into_additional_info(self) -> HashMap<GameId, IndexSet<AdditionalInfo>> {
        self.additional_info.into_inner()
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("games", &self.games.len())
            .field("cached", &self.cache.borrow().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Platform;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(games: Vec<Game>) -> FilterContext {
        FilterContext::new(games, Arc::new(|_: &Path| 0u64))
    }

    #[test]
    fn cache_computes_once_per_key() {
        let ctx = context(Vec::new());
        let calls = Cell::new(0);

        let first = ctx.cache("answer", || {
            calls.set(calls.get() + 1);
            42u32
        });
        let second = ctx.cache("answer", || {
            calls.set(calls.get() + 1);
            7u32
        });

        assert_eq!((*first, *second), (42, 42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cache_allows_nested_use() {
        let ctx = context(Vec::new());
        let outer = ctx.cache("outer", || *ctx.cache("inner", || 2u8) * 3);
        assert_eq!(*outer, 6);
    }

    #[test]
    #[should_panic(expected = "different type")]
    fn cache_type_mismatch_panics() {
        let ctx = context(Vec::new());
        ctx.cache("key", || 1u8);
        ctx.cache("key", || "text");
    }

    #[test]
    fn additional_info_has_set_semantics() {
        let game = Game::new(1, "Doom", Platform::Pc, "/doom");
        let ctx = context(vec![game.clone()]);
        let note = RuleFinding::Note {
            text: "dup".into(),
        };

        ctx.add_additional_info(&game, RuleKind::Duplications, note.clone());
        ctx.add_additional_info(&game, RuleKind::Duplications, note.clone());
        ctx.add_additional_info(&game, RuleKind::Tag, note);

        assert_eq!(ctx.additional_info(game.id).len(), 2);
        assert!(ctx.additional_info(GameId(2)).is_empty());
    }

    #[test]
    fn size_is_measured_once_per_game() {
        let measured = Arc::new(AtomicUsize::new(0));
        let counter = measured.clone();
        let ctx = FilterContext::new(
            Vec::new(),
            Arc::new(move |_: &Path| {
                counter.fetch_add(1, Ordering::SeqCst);
                1024u64
            }),
        );
        let game = Game::new(1, "Doom", Platform::Pc, "/doom");

        assert_eq!(ctx.size(&game), 1024);
        assert_eq!(ctx.size(&game), 1024);
        assert_eq!(measured.load(Ordering::SeqCst), 1);
    }
}
