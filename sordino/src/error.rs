/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Error types reported by the harness and by handlers.

use thiserror::Error;

use crate::mem::MemoryError;
use crate::module::FnAddr;

/// An interception could not be installed at a resolved address.
///
/// Unlike a symbol that fails to resolve (possible on every module load and
/// silently skipped), installation only fails when something is genuinely
/// wrong: the address is already claimed, or the engine cannot redirect it.
/// The harness treats this as fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// An interception is already installed at this address.
    #[error("interception already installed at {0}")]
    AlreadyInstalled(FnAddr),

    /// The engine could not redirect the function at this address.
    #[error("engine rejected interception at {0}: {1}")]
    Rejected(FnAddr, String),
}

/// Errors surfaced by the harness and by per-call handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to install an interception at a resolved address.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// A read or write in the target's address space failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The target asked for a notification scheme the harness cannot
    /// service, so captured state would silently diverge from reality.
    #[error("unsupported call shape in {symbol}: {reason}")]
    UnsupportedCallShape {
        /// The intercepted function.
        symbol: String,
        /// What the target asked for.
        reason: String,
    },

    /// An I/O error, typically from the capture sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error from tool-specific code.
    #[error(transparent)]
    Tool(#[from] anyhow::Error),
}

impl Error {
    /// True if this error must abort the run rather than skip one symbol.
    ///
    /// Everything routed through [`Error`] already is: resolution misses
    /// never construct one. The method exists so call sites read as policy
    /// instead of as a blanket bail.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_error_messages() {
        let err = InstallError::AlreadyInstalled(FnAddr(0x1000));
        assert_eq!(err.to_string(), "interception already installed at 0x1000");
        let err = InstallError::Rejected(FnAddr(0x2000), "code region is read-only".into());
        assert_eq!(
            err.to_string(),
            "engine rejected interception at 0x2000: code region is read-only"
        );
    }

    #[test]
    fn transparent_legs() {
        let err: Error = InstallError::AlreadyInstalled(FnAddr(0xabc)).into();
        assert_eq!(err.to_string(), "interception already installed at 0xabc");
        let err: Error = MemoryError { addr: 0, len: 4 }.into();
        assert_eq!(err.to_string(), "invalid memory access of 4 bytes at 0x0");
    }

    #[test]
    fn unsupported_call_shape_message() {
        let err = Error::UnsupportedCallShape {
            symbol: "waveOutOpen".into(),
            reason: "callback function delivery".into(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported call shape in waveOutOpen: callback function delivery"
        );
        assert!(err.is_fatal());
    }
}
