/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Capture tools built on the sordino harness.
//!
//! Each tool implements [`sordino::Tool`] and can be handed to a
//! [`sordino::Harness`] behind any engine, including the rig:
//!
//! - [`PcmTapTool`] taps ALSA and PulseAudio simple API playback into a
//!   raw PCM file.
//! - [`WaveTapTool`] does the same for waveOut playback.
//! - [`NoSleepTool`] turns `sleep` into an immediate no-op.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod nosleep;
pub mod pcmtap;
pub mod wavetap;

pub use nosleep::NoSleepTool;
pub use pcmtap::PcmTapTool;
pub use wavetap::TargetAbi;
pub use wavetap::WaveTapTool;
