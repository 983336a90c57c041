/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Turns `sleep` into an immediate no-op.
//!
//! The smallest useful tool, and a handy companion to the capture tools:
//! a target pacing itself against the audio clock has nothing to pace
//! against once writes are suppressed.

use sordino::Error;
use sordino::HookSet;
use sordino::Module;
use sordino::Tool;
use tracing::debug;

/// Suppresses every `sleep` call, returning 0 (fully slept).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSleepTool;

impl Tool for NoSleepTool {
    fn name(&self) -> &'static str {
        "nosleep"
    }

    fn hooks(&self, _module: &Module) -> HookSet {
        let mut hooks = HookSet::new();
        hooks.wrap_pre("sleep", |call| {
            let seconds = call.arg(0);
            debug!(seconds, "sleep suppressed");
            call.skip_call(0, 0);
            Ok(())
        });
        hooks
    }

    fn on_exit(&self) -> Result<(), Error> {
        debug!("nosleep done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sordino::rig::Rig;
    use sordino::Harness;

    use super::*;

    #[test]
    fn sleep_is_skipped() {
        let harness = Harness::new(NoSleepTool);
        let mut rig = Rig::new();
        let libc = rig.add_module("libc.so.6", &["sleep", "usleep"]);
        rig.load_module(&harness, &libc).unwrap();
        rig.set_original("sleep", |_args| panic!("must not sleep"));

        assert_eq!(rig.call("sleep", &[30]).unwrap(), 0);
        assert_eq!(rig.last_skip(), Some((0, 0)));
        assert_eq!(rig.original_calls("sleep"), 0);
        // Only sleep is targeted.
        let stats = harness.stats();
        assert_eq!(stats.hooks_installed, 1);
        rig.shutdown(&harness).unwrap();
    }
}
