/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! An in-process engine for exercising tools without a real target.
//!
//! The rig plays both sides of the seam: it is an [`Engine`] the harness
//! installs interceptions into, and a fake target whose scripted functions
//! those interceptions fire on. Tests declare modules and exports, feed
//! load events to a [`Harness`], then drive calls and assert on what the
//! handlers did.
//!
//! [`Harness`]: crate::Harness

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use anyhow::anyhow;

use crate::call::CallContext;
use crate::engine::Engine;
use crate::error::Error;
use crate::error::InstallError;
use crate::harness::Harness;
use crate::hook::HookAction;
use crate::hook::PostHook;
use crate::hook::PreHook;
use crate::hook::ReplaceHook;
use crate::mem::MemoryAccess;
use crate::mem::MemoryError;
use crate::module::FnAddr;
use crate::module::Module;
use crate::module::RawArg;
use crate::tool::Tool;

const MEMORY_BASE: RawArg = 0x1000;
const MEMORY_GAP: RawArg = 0x40;
const MODULE_BASE: u64 = 0x4000_0000;
const MODULE_SPAN: u64 = 0x1_0000;

/// Byte-addressed memory for the rig's fake target.
///
/// Allocations are disjoint regions with a gap in between, so a buffer
/// overrun in a handler shows up as a [`MemoryError`] instead of silently
/// landing in a neighboring allocation.
#[derive(Debug)]
pub struct RigMemory {
    regions: BTreeMap<RawArg, Vec<u8>>,
    next: RawArg,
}

impl Default for RigMemory {
    fn default() -> Self {
        RigMemory {
            regions: BTreeMap::new(),
            next: MEMORY_BASE,
        }
    }
}

impl RigMemory {
    /// An empty address space.
    pub fn new() -> Self {
        Default::default()
    }

    /// Allocate a zeroed region of `len` bytes and return its address.
    pub fn alloc(&mut self, len: usize) -> RawArg {
        let addr = self.next;
        self.regions.insert(addr, vec![0u8; len]);
        self.next = addr + len as RawArg + MEMORY_GAP;
        addr
    }

    /// Allocate a region initialized with `bytes`.
    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> RawArg {
        let addr = self.alloc(bytes.len());
        if let Some(region) = self.regions.get_mut(&addr) {
            region.copy_from_slice(bytes);
        }
        addr
    }
}

impl MemoryAccess for RigMemory {
    fn read(&self, addr: RawArg, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        let err = MemoryError {
            addr,
            len: buf.len(),
        };
        let (base, region) = match self.regions.range(..=addr).next_back() {
            Some(found) => found,
            None => return Err(err),
        };
        let offset = (addr - base) as usize;
        let end = match offset.checked_add(buf.len()) {
            Some(end) if end <= region.len() => end,
            _ => return Err(err),
        };
        buf.copy_from_slice(&region[offset..end]);
        Ok(())
    }

    fn write(&mut self, addr: RawArg, buf: &[u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        let err = MemoryError {
            addr,
            len: buf.len(),
        };
        let (base, region) = match self.regions.range_mut(..=addr).next_back() {
            Some(found) => found,
            None => return Err(err),
        };
        let offset = (addr - base) as usize;
        let end = match offset.checked_add(buf.len()) {
            Some(end) if end <= region.len() => end,
            _ => return Err(err),
        };
        region[offset..end].copy_from_slice(buf);
        Ok(())
    }
}

/// One in-flight call inside the rig.
struct RigCall<'a> {
    args: Vec<RawArg>,
    ret: RawArg,
    skip: Option<(RawArg, u32)>,
    memory: &'a mut RigMemory,
}

impl CallContext for RigCall<'_> {
    fn arg(&self, index: usize) -> RawArg {
        self.args.get(index).copied().unwrap_or(0)
    }

    fn set_arg(&mut self, index: usize, value: RawArg) {
        if let Some(slot) = self.args.get_mut(index) {
            *slot = value;
        }
    }

    fn return_value(&self) -> RawArg {
        self.ret
    }

    fn set_return_value(&mut self, value: RawArg) {
        self.ret = value;
    }

    fn skip_call(&mut self, return_value: RawArg, stack_adjust: u32) {
        self.skip = Some((return_value, stack_adjust));
    }

    fn memory(&mut self) -> &mut dyn MemoryAccess {
        self.memory
    }
}

type OriginalFn = Box<dyn FnMut(&[RawArg]) -> RawArg>;

/// A scriptable fake target.
///
/// Declare modules with [`add_module`], optionally script what their
/// exports do with [`set_original`], deliver load events with
/// [`load_module`], then [`call`] exports the way the target would.
///
/// [`add_module`]: Self::add_module
/// [`set_original`]: Self::set_original
/// [`load_module`]: Self::load_module
/// [`call`]: Self::call
#[derive(Default)]
pub struct Rig {
    modules: Vec<(Module, BTreeMap<String, FnAddr>)>,
    installed: HashMap<FnAddr, HookAction>,
    originals: HashMap<FnAddr, OriginalFn>,
    original_calls: HashMap<FnAddr, u64>,
    memory: RigMemory,
    last_skip: Option<(RawArg, u32)>,
}

impl fmt::Debug for Rig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rig")
            .field("modules", &self.modules.len())
            .field("installed", &self.installed.len())
            .field("last_skip", &self.last_skip)
            .finish_non_exhaustive()
    }
}

impl Rig {
    /// An empty rig with no modules.
    pub fn new() -> Self {
        Default::default()
    }

    /// Declare a module exporting `symbols` and return its identity.
    ///
    /// The module is not yet loaded as far as any harness is concerned;
    /// pass the returned [`Module`] to [`load_module`] for that.
    ///
    /// [`load_module`]: Self::load_module
    pub fn add_module(&mut self, name: &str, symbols: &[&str]) -> Module {
        let base = MODULE_BASE + self.modules.len() as u64 * MODULE_SPAN;
        let module = Module::new(name, format!("/lib/{name}"), base);
        let exports = symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.to_string(), FnAddr(base + 0x100 + i as u64 * 0x10)))
            .collect();
        self.modules.push((module.clone(), exports));
        module
    }

    /// Script what `symbol` does when its original runs. Unscripted
    /// exports return `0`.
    ///
    /// # Panics
    ///
    /// Panics if no declared module exports `symbol`.
    pub fn set_original<F>(&mut self, symbol: &str, original: F)
    where
        F: FnMut(&[RawArg]) -> RawArg + 'static,
    {
        let addr = self
            .lookup(symbol)
            .unwrap_or_else(|| panic!("no declared module exports {symbol}"));
        self.originals.insert(addr, Box::new(original));
    }

    /// Deliver a module-load event for `module` to `harness`, with the rig
    /// acting as the engine.
    pub fn load_module<T: Tool>(
        &mut self,
        harness: &Harness<T>,
        module: &Module,
    ) -> Result<(), Error> {
        harness.module_loaded(module, self)
    }

    /// Deliver the process-exit event to `harness`.
    pub fn shutdown<T: Tool>(&mut self, harness: &Harness<T>) -> Result<(), Error> {
        harness.process_exit()
    }

    /// Call `symbol` the way the target would, running whatever hooks are
    /// installed on it and the original underneath.
    pub fn call(&mut self, symbol: &str, args: &[RawArg]) -> Result<RawArg, Error> {
        let addr = self
            .lookup(symbol)
            .ok_or_else(|| Error::Tool(anyhow!("no declared module exports {symbol}")))?;
        let action = self.installed.get(&addr).cloned();
        let mut call = RigCall {
            args: args.to_vec(),
            ret: 0,
            skip: None,
            memory: &mut self.memory,
        };
        match action {
            None => Ok(Self::run_original(
                &mut self.originals,
                &mut self.original_calls,
                addr,
                &call.args,
            )),
            Some(HookAction::Wrap { pre, post }) => {
                if let Some(pre) = pre {
                    pre(&mut call)?;
                }
                if let Some((value, stack_adjust)) = call.skip {
                    // Skipping suppresses the original and the post hook.
                    self.last_skip = Some((value, stack_adjust));
                    return Ok(value);
                }
                call.ret = Self::run_original(
                    &mut self.originals,
                    &mut self.original_calls,
                    addr,
                    &call.args,
                );
                if let Some(post) = post {
                    post(&mut call)?;
                }
                Ok(call.ret)
            }
            Some(HookAction::Replace { substitute }) => substitute(&mut call),
        }
    }

    fn run_original(
        originals: &mut HashMap<FnAddr, OriginalFn>,
        original_calls: &mut HashMap<FnAddr, u64>,
        addr: FnAddr,
        args: &[RawArg],
    ) -> RawArg {
        *original_calls.entry(addr).or_insert(0) += 1;
        match originals.get_mut(&addr) {
            Some(original) => original(args),
            None => 0,
        }
    }

    /// The fake target's memory, for staging buffers and structs.
    pub fn memory(&mut self) -> &mut RigMemory {
        &mut self.memory
    }

    /// How many times the original behind `symbol` has run. Zero for
    /// unknown symbols.
    pub fn original_calls(&self, symbol: &str) -> u64 {
        match self.lookup(symbol) {
            Some(addr) => self.original_calls.get(&addr).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// The most recent `(return_value, stack_adjust)` a pre hook skipped
    /// with, if any call has been skipped yet.
    pub fn last_skip(&self) -> Option<(RawArg, u32)> {
        self.last_skip
    }

    /// Number of interceptions installed so far.
    pub fn installed(&self) -> usize {
        self.installed.len()
    }

    fn lookup(&self, symbol: &str) -> Option<FnAddr> {
        self.modules
            .iter()
            .find_map(|(_, exports)| exports.get(symbol).copied())
    }
}

impl Engine for Rig {
    fn resolve(&self, module: &Module, symbol: &str) -> Option<FnAddr> {
        self.modules
            .iter()
            .find(|(candidate, _)| candidate.base == module.base)
            .and_then(|(_, exports)| exports.get(symbol).copied())
    }

    fn install_wrap(
        &mut self,
        addr: FnAddr,
        pre: Option<PreHook>,
        post: Option<PostHook>,
    ) -> Result<(), InstallError> {
        if self.installed.contains_key(&addr) {
            return Err(InstallError::AlreadyInstalled(addr));
        }
        self.installed.insert(addr, HookAction::Wrap { pre, post });
        Ok(())
    }

    fn install_replace(
        &mut self,
        addr: FnAddr,
        substitute: ReplaceHook,
    ) -> Result<(), InstallError> {
        if self.installed.contains_key(&addr) {
            return Err(InstallError::AlreadyInstalled(addr));
        }
        self.installed
            .insert(addr, HookAction::Replace { substitute });
        Ok(())
    }
}
