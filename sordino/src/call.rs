/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The view a handler gets of one in-flight intercepted call.

use crate::mem::MemoryAccess;
use crate::module::RawArg;

/// One in-flight intercepted call, as seen by a handler.
///
/// Pre-call handlers may inspect and rewrite arguments, reach into the
/// target's memory through [`memory`], or suppress the call entirely with
/// [`skip_call`]. Post-call handlers see and may rewrite the return value.
/// Which of these is meaningful depends on when the handler runs; the
/// engine documents the rest.
///
/// Argument slots beyond the call's arity read as `0` and ignore writes.
///
/// [`memory`]: Self::memory
/// [`skip_call`]: Self::skip_call
pub trait CallContext {
    /// Value of argument `index`.
    fn arg(&self, index: usize) -> RawArg;

    /// Overwrite argument `index` before the original function sees it.
    fn set_arg(&mut self, index: usize, value: RawArg);

    /// The call's return value. Meaningful in post-call handlers only.
    fn return_value(&self) -> RawArg;

    /// Overwrite the value the caller will receive.
    fn set_return_value(&mut self, value: RawArg);

    /// Suppress the original function. The caller receives `return_value`
    /// as if the function had run, and `stack_adjust` extra bytes are
    /// popped for conventions where the callee cleans its arguments.
    fn skip_call(&mut self, return_value: RawArg, stack_adjust: u32);

    /// Access to the target's memory for pointer arguments.
    fn memory(&mut self) -> &mut dyn MemoryAccess;
}
