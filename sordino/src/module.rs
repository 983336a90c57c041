/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Module identity and the raw value primitives seen at call sites.

use std::path::PathBuf;

use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

/// A machine word as it appears in an intercepted call: an argument slot or
/// a return value. Whether it is an integer, a pointer, or a flags word is
/// up to the handler that knows the function's signature.
pub type RawArg = u64;

/// Resolved entry-point address of an exported function.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("{_0:#x}")]
pub struct FnAddr(pub u64);

/// Identity of a module mapped into the target process.
///
/// Handed to [`crate::Tool::hooks`] on every module-load event. Tools may
/// scope their targets by module name or path, though most never need to:
/// symbol resolution already makes unrelated modules a no-op.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[display("{name} @ {base:#x}")]
pub struct Module {
    /// Short name, e.g. `libasound.so.2`.
    pub name: String,
    /// Filesystem path the module was mapped from.
    pub path: PathBuf,
    /// Base address of the mapping.
    pub base: u64,
}

impl Module {
    /// Describe a mapped module.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, base: u64) -> Self {
        Module {
            name: name.into(),
            path: path.into(),
            base,
        }
    }
}
