// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registration of occlusion queries with the renderer.

use smallvec::SmallVec;
use std::sync::Arc;
use swr_common::Query;

/// The queries known to a renderer.
///
/// Every draw call captures the registered queries that are building at submission time.
#[derive(Debug, Default)]
pub(crate) struct QueryTracker {
    queries: Vec<Arc<Query>>,
}

impl QueryTracker {
    pub(crate) fn add(&mut self, query: Arc<Query>) {
        if !self.contains(&query) {
            self.queries.push(query);
        }
    }

    pub(crate) fn remove(&mut self, query: &Arc<Query>) {
        self.queries.retain(|q| !Arc::ptr_eq(q, query));
    }

    pub(crate) fn contains(&self, query: &Arc<Query>) -> bool {
        self.queries.iter().any(|q| Arc::ptr_eq(q, query))
    }

    /// Start counting samples into `query`, registering it if needed.
    pub(crate) fn begin(&mut self, query: &Arc<Query>) {
        query.begin();
        self.add(query.clone());
    }

    /// Stop counting samples into `query`. Draw calls already submitted still report to it.
    pub(crate) fn end(&self, query: &Arc<Query>) {
        query.end();
    }

    /// The queries a draw call of `units` units reports to, retained once per unit.
    pub(crate) fn capture(&self, units: u32) -> SmallVec<[Arc<Query>; 4]> {
        self.queries
            .iter()
            .filter(|query| query.is_building())
            .map(|query| {
                query.retain(units);
                query.clone()
            })
            .collect()
    }
}
