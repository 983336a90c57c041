/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![doc = include_str!("../../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod call;
mod capture;
mod engine;
mod error;
mod format;
mod harness;
mod hook;
pub mod logging;
mod mem;
mod module;
mod policy;
pub mod rig;
mod sink;
mod tool;

pub use call::CallContext;
pub use capture::CaptureConfig;
pub use capture::CaptureSession;
pub use engine::Engine;
pub use error::Error;
pub use error::InstallError;
pub use format::SampleFormat;
pub use format::StreamParams;
pub use harness::Harness;
pub use harness::HarnessStats;
pub use hook::HookAction;
pub use hook::HookSet;
pub use hook::InterceptionTarget;
pub use hook::PostHook;
pub use hook::PreHook;
pub use hook::ReplaceHook;
pub use mem::LocalMemory;
pub use mem::MemoryAccess;
pub use mem::MemoryError;
pub use module::FnAddr;
pub use module::Module;
pub use module::RawArg;
pub use policy::ReturnPolicy;
pub use sink::PcmSink;
pub use tool::Tool;
