/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The seam between the harness and an instrumentation backend.

use crate::error::InstallError;
use crate::hook::PostHook;
use crate::hook::PreHook;
use crate::hook::ReplaceHook;
use crate::module::FnAddr;
use crate::module::Module;

/// An instrumentation backend capable of redirecting function calls.
///
/// The harness is backend-agnostic: it asks an `Engine` to resolve symbols
/// and install interceptions, and the backend later invokes the installed
/// handlers with a [`CallContext`] when the target reaches them. The
/// embedding is responsible for delivering module-load and process-exit
/// events into [`Harness::module_loaded`] and [`Harness::process_exit`].
///
/// [`CallContext`]: crate::CallContext
/// [`Harness::module_loaded`]: crate::Harness::module_loaded
/// [`Harness::process_exit`]: crate::Harness::process_exit
pub trait Engine {
    /// Look up an exported function in a loaded module.
    ///
    /// `None` means the module simply does not export `symbol`. That is an
    /// everyday outcome, not an error: most modules export none of the
    /// functions a tool cares about.
    fn resolve(&self, module: &Module, symbol: &str) -> Option<FnAddr>;

    /// Redirect calls of the function at `addr` through the given pre and
    /// post handlers, with the original still running in between.
    fn install_wrap(
        &mut self,
        addr: FnAddr,
        pre: Option<PreHook>,
        post: Option<PostHook>,
    ) -> Result<(), InstallError>;

    /// Redirect calls of the function at `addr` to `substitute`. The
    /// original function no longer runs.
    fn install_replace(&mut self, addr: FnAddr, substitute: ReplaceHook)
        -> Result<(), InstallError>;
}
