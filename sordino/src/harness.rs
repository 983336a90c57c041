/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The harness wiring a tool's hooks into an instrumentation engine.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;
use tracing::info;

use crate::engine::Engine;
use crate::error::Error;
use crate::hook::HookAction;
use crate::hook::InterceptionTarget;
use crate::module::Module;
use crate::tool::Tool;

/// Installation counters, readable at any point in the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarnessStats {
    /// Module-load events observed.
    pub modules_seen: u64,
    /// Interceptions successfully installed.
    pub hooks_installed: u64,
    /// Targets skipped because the symbol did not resolve.
    pub symbols_skipped: u64,
}

/// Drives one [`Tool`] against an instrumentation [`Engine`].
///
/// The embedding forwards every module-load event to [`module_loaded`] and
/// the process-exit event to [`process_exit`]; the harness does the rest:
/// asks the tool for its hooks, resolves each symbol, and installs the
/// requested interceptions in declaration order.
///
/// A symbol that fails to resolve is skipped with a log line and the run
/// continues. A resolved symbol whose installation fails is fatal: the
/// error propagates to the embedding, which is expected to abort the run
/// rather than continue with partial coverage.
///
/// [`module_loaded`]: Self::module_loaded
/// [`process_exit`]: Self::process_exit
#[derive(Debug)]
pub struct Harness<T> {
    tool: T,
    modules_seen: AtomicU64,
    hooks_installed: AtomicU64,
    symbols_skipped: AtomicU64,
}

impl<T: Tool> Harness<T> {
    /// Wire up `tool`. No interceptions exist until modules load.
    pub fn new(tool: T) -> Self {
        info!(
            tool = tool.name(),
            version = env!("CARGO_PKG_VERSION"),
            "harness initialized"
        );
        Harness {
            tool,
            modules_seen: AtomicU64::new(0),
            hooks_installed: AtomicU64::new(0),
            symbols_skipped: AtomicU64::new(0),
        }
    }

    /// The tool being driven.
    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Handle one module-load event.
    ///
    /// Resolution misses are logged and skipped. Any installation failure
    /// or handler-construction error is returned and must abort the run.
    pub fn module_loaded(&self, module: &Module, engine: &mut dyn Engine) -> Result<(), Error> {
        self.modules_seen.fetch_add(1, Ordering::Relaxed);
        let hooks = self.tool.hooks(module);
        debug!(%module, targets = hooks.len(), "module loaded");

        for target in hooks {
            let InterceptionTarget { symbol, action } = target;
            let addr = match engine.resolve(module, &symbol) {
                Some(addr) => addr,
                None => {
                    self.symbols_skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(%module, symbol, "symbol not exported, skipped");
                    continue;
                }
            };
            let installed = match action {
                HookAction::Wrap { pre, post } => engine.install_wrap(addr, pre, post),
                HookAction::Replace { substitute } => engine.install_replace(addr, substitute),
            };
            match installed {
                Ok(()) => {
                    self.hooks_installed.fetch_add(1, Ordering::Relaxed);
                    info!(%module, symbol, %addr, "interception installed");
                }
                Err(err) => {
                    error!(%module, symbol, %addr, %err, "interception failed to install");
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// Handle the process-exit event: log the final counters, then give
    /// the tool its chance to flush and summarize.
    pub fn process_exit(&self) -> Result<(), Error> {
        let stats = self.stats();
        info!(
            modules = stats.modules_seen,
            installed = stats.hooks_installed,
            skipped = stats.symbols_skipped,
            "target exiting"
        );
        self.tool.on_exit()
    }

    /// Snapshot of the installation counters.
    pub fn stats(&self) -> HarnessStats {
        HarnessStats {
            modules_seen: self.modules_seen.load(Ordering::Relaxed),
            hooks_installed: self.hooks_installed.load(Ordering::Relaxed),
            symbols_skipped: self.symbols_skipped.load(Ordering::Relaxed),
        }
    }
}
