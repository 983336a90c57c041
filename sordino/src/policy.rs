/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! A declarative table of functions to neutralize with fixed results.

use std::collections::BTreeMap;

use crate::hook::HookSet;
use crate::module::RawArg;

/// Maps symbol names to the fixed result their replacement returns.
///
/// Capture tools routinely have a handful of functions that must be
/// short-circuited rather than observed: waits that would block forever
/// once writes are suppressed, recovery calls with nothing to recover,
/// drains with nothing to drain. Listing them in one table keeps the
/// sentinel values next to each other and out of the handler code.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReturnPolicy {
    results: BTreeMap<String, RawArg>,
}

impl ReturnPolicy {
    /// An empty policy.
    pub fn new() -> Self {
        Default::default()
    }

    /// Fix `symbol` to return `result`. Later entries win.
    pub fn fix(&mut self, symbol: impl Into<String>, result: RawArg) -> &mut Self {
        self.results.insert(symbol.into(), result);
        self
    }

    /// The fixed result for `symbol`, if it has one.
    pub fn result_for(&self, symbol: &str) -> Option<RawArg> {
        self.results.get(symbol).copied()
    }

    /// Iterate over `(symbol, result)` entries in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RawArg)> {
        self.results.iter().map(|(symbol, result)| (symbol.as_str(), *result))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if no entries.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Add a replacement to `hooks` for every entry in the policy.
    pub fn apply(&self, hooks: &mut HookSet) {
        for (symbol, result) in self.iter() {
            hooks.replace_fixed(symbol, result);
        }
    }
}
