// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memoization of compiled routines by configuration.

use crate::routine::RoutineError;
use core::fmt::{Debug, Formatter};
use core::hash::Hash;
use hashbrown::HashMap;
use std::sync::Arc;

/// Counters describing how well a [`RoutineCache`] is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Compiled routines keyed by the configuration they were generated for.
///
/// Keys are plain values: two equal configurations always map to the same routine
/// instance. Entries live until [`invalidate`](Self::invalidate) or
/// [`remove`](Self::remove) is called, and draw calls keep their own reference to the
/// routines they use, so evicting an entry never affects work in flight.
pub struct RoutineCache<K, R: ?Sized> {
    label: &'static str,
    routines: HashMap<K, Arc<R>>,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone + Debug, R: ?Sized> RoutineCache<K, R> {
    /// Create an empty cache. `label` only shows up in log messages.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            routines: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Get the routine for `key`, generating it with `compile` if there is none yet.
    ///
    /// A failed generation leaves the cache untouched.
    pub fn acquire(
        &mut self,
        key: &K,
        compile: impl FnOnce(&K) -> Result<Arc<R>, RoutineError>,
    ) -> Result<Arc<R>, RoutineError> {
        if let Some(routine) = self.routines.get(key) {
            self.stats.hits += 1;
            return Ok(routine.clone());
        }

        self.stats.misses += 1;
        log::debug!("{} routine cache miss for {key:?}", self.label);

        let routine = compile(key)?;
        self.routines.insert(key.clone(), routine.clone());

        Ok(routine)
    }

    /// The cached routine for `key`, without generating one.
    pub fn get(&self, key: &K) -> Option<Arc<R>> {
        self.routines.get(key).cloned()
    }

    /// Drop the routine for `key`.
    pub fn remove(&mut self, key: &K) -> Option<Arc<R>> {
        self.routines.remove(key)
    }

    /// Drop every routine, for example after a shader was replaced.
    pub fn invalidate(&mut self) {
        if !self.routines.is_empty() {
            log::debug!(
                "invalidating {} cached {} routines",
                self.routines.len(),
                self.label
            );
        }
        self.routines.clear();
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K, R: ?Sized> Debug for RoutineCache<K, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoutineCache")
            .field("label", &self.label)
            .field("len", &self.routines.len())
            .field("stats", &self.stats)
            .finish()
    }
}
