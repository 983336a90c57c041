/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Access to the intercepted process's memory.
//!
//! Handlers frequently receive pointer arguments into the target's address
//! space: sample buffers to copy out, parameter structs to decode, header
//! fields to rewrite. [`MemoryAccess`] is the seam those reads and writes go
//! through, so handlers stay oblivious to whether the target shares our
//! address space or lives behind a debug transport.

use thiserror::Error;

use crate::module::RawArg;

/// A memory access failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid memory access of {len} bytes at {addr:#x}")]
pub struct MemoryError {
    /// Target address of the failed access.
    pub addr: RawArg,
    /// Length of the failed access in bytes.
    pub len: usize,
}

/// Byte-level reads and writes in the target's address space.
///
/// All multi-byte helpers assume little-endian layout, which matches every
/// target this crate currently drives.
pub trait MemoryAccess {
    /// Read exactly `buf.len()` bytes starting at `addr`.
    fn read(&self, addr: RawArg, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write all of `buf` starting at `addr`.
    fn write(&mut self, addr: RawArg, buf: &[u8]) -> Result<(), MemoryError>;

    /// Read `len` bytes starting at `addr` into a fresh buffer.
    fn read_bytes(&self, addr: RawArg, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0u8; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Read a single byte.
    fn read_u8(&self, addr: RawArg) -> Result<u8, MemoryError> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    /// Read a little-endian `u16`.
    fn read_u16(&self, addr: RawArg) -> Result<u16, MemoryError> {
        let mut buf = [0u8; 2];
        self.read(addr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian `u32`.
    fn read_u32(&self, addr: RawArg) -> Result<u32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian `u64`.
    fn read_u64(&self, addr: RawArg) -> Result<u64, MemoryError> {
        let mut buf = [0u8; 8];
        self.read(addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Write a little-endian `u32`.
    fn write_u32(&mut self, addr: RawArg, value: u32) -> Result<(), MemoryError> {
        self.write(addr, &value.to_le_bytes())
    }
}

/// Memory access for a target sharing our own address space.
///
/// Addresses are treated as pointers and dereferenced directly. Only the
/// null pointer is rejected; anything else is the caller's promise.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMemory;

impl LocalMemory {
    /// A fresh accessor. Stateless, so this is purely for symmetry.
    pub fn new() -> Self {
        LocalMemory
    }
}

impl MemoryAccess for LocalMemory {
    fn read(&self, addr: RawArg, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        if addr == 0 {
            return Err(MemoryError {
                addr,
                len: buf.len(),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn write(&mut self, addr: RawArg, buf: &[u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        if addr == 0 {
            return Err(MemoryError {
                addr,
                len: buf.len(),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(buf.as_ptr(), addr as *mut u8, buf.len());
        }
        Ok(())
    }
}
