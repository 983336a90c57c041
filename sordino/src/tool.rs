/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The trait a tool implements to declare its interceptions.

use crate::error::Error;
use crate::hook::HookSet;
use crate::module::Module;

/// A tool plugged into the [`Harness`].
///
/// The harness calls [`hooks`] once per loaded module; the tool answers
/// with the interceptions it wants in that module. Whatever state the
/// tool's handlers share (a capture session, counters) lives in the tool
/// and is captured by the handler closures it builds.
///
/// [`Harness`]: crate::Harness
/// [`hooks`]: Self::hooks
pub trait Tool: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The interceptions this tool wants in `module`.
    ///
    /// Returning an empty set is the common case and costs nothing.
    fn hooks(&self, module: &Module) -> HookSet;

    /// Called once when the target process is about to exit. Flush and
    /// summarize here.
    fn on_exit(&self) -> Result<(), Error> {
        Ok(())
    }
}
