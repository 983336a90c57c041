/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The file sink captured audio payloads are appended to.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Error;

/// Append-only sink writing raw PCM bytes to a file.
///
/// Writes go straight to the file so that whatever was captured before a
/// crash of the target is still on disk. Byte accounting lives here rather
/// than in callers so the exit summary cannot drift from what was written.
#[derive(Debug)]
pub struct PcmSink {
    file: File,
    path: PathBuf,
    bytes_written: u64,
}

impl PcmSink {
    /// Create (or truncate) the output file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(PcmSink {
            file,
            path,
            bytes_written: 0,
        })
    }

    /// Append a payload. Zero-length payloads are written like any other
    /// (they are a no-op on disk but still a call that happened).
    pub fn append(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.file.write_all(payload)?;
        self.bytes_written += payload.len() as u64;
        Ok(())
    }

    /// Total bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Where the bytes are going.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and durably close the sink, returning the final byte count.
    pub fn close(mut self) -> Result<u64, Error> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(self.bytes_written)
    }
}
