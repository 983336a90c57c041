/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Taps waveOut playback into a raw PCM file.
//!
//! `waveOutOpen` carries the whole stream shape in its WAVEFORMATEX, so
//! one call teaches the session the format, channels, and rate.
//! `waveOutWrite` hands over a WAVEHDR; the tool copies the buffer it
//! points at, marks the header done in place, and skips the call with the
//! success result. An application polling the header's flags proceeds as
//! if the device had played the buffer.
//!
//! waveOut can deliver completion four ways. Window messages and polling
//! need nothing from us, and an event handle is remembered so waits on it
//! show up in the trace. A callback *function* is the one shape the tool
//! refuses: the callback would never fire once writes are suppressed, and
//! there is no header to patch in its place, so the target would hang in
//! a way no capture is worth.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use sordino::CaptureConfig;
use sordino::CaptureSession;
use sordino::Error;
use sordino::HookSet;
use sordino::MemoryAccess;
use sordino::MemoryError;
use sordino::Module;
use sordino::RawArg;
use sordino::SampleFormat;
use sordino::Tool;
use tracing::debug;
use tracing::trace;
use tracing::warn;

/// Mask selecting the callback-delivery bits of `waveOutOpen`'s `fdwOpen`.
///
/// The delivery schemes are enumerated values under this mask, not
/// independent bits; `CALLBACK_EVENT & CALLBACK_FUNCTION` is nonzero, so
/// only a masked equality test can tell them apart.
pub const CALLBACK_TYPEMASK: RawArg = 0x0007_0000;
/// Completion delivered by signaling an event handle.
pub const CALLBACK_EVENT: RawArg = 0x0005_0000;
/// Completion delivered by invoking a user callback function.
pub const CALLBACK_FUNCTION: RawArg = 0x0003_0000;

/// waveOut success result.
pub const MMSYSERR_NOERROR: RawArg = 0;

// WAVEFORMATEX field offsets: nChannels, nSamplesPerSec, wBitsPerSample.
const WFX_CHANNELS_OFFSET: RawArg = 2;
const WFX_SAMPLES_PER_SEC_OFFSET: RawArg = 4;
const WFX_BITS_PER_SAMPLE_OFFSET: RawArg = 14;

bitflags! {
    /// WAVEHDR `dwFlags` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaveHdrFlags: u32 {
        /// The device is done with the buffer.
        const DONE = 0x0000_0001;
        /// The buffer has been prepared.
        const PREPARED = 0x0000_0002;
        /// The buffer begins a loop.
        const BEGIN_LOOP = 0x0000_0004;
        /// The buffer ends a loop.
        const END_LOOP = 0x0000_0008;
        /// The buffer is queued on the device.
        const IN_QUEUE = 0x0000_0010;
    }
}

/// Pointer width of the target, which fixes the WAVEHDR layout and the
/// calling convention of the waveOut entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAbi {
    /// 32-bit target. Entry points are stdcall, so a skipped call must
    /// also pop its arguments.
    X86,
    /// 64-bit target.
    X64,
}

impl TargetAbi {
    /// Offset of WAVEHDR `dwBufferLength`, just past the `lpData` pointer.
    fn hdr_len_offset(self) -> RawArg {
        match self {
            TargetAbi::X86 => 4,
            TargetAbi::X64 => 8,
        }
    }

    /// Offset of WAVEHDR `dwFlags`.
    fn hdr_flags_offset(self) -> RawArg {
        match self {
            TargetAbi::X86 => 16,
            TargetAbi::X64 => 24,
        }
    }

    fn read_ptr(self, memory: &dyn MemoryAccess, addr: RawArg) -> Result<RawArg, MemoryError> {
        match self {
            TargetAbi::X86 => memory.read_u32(addr).map(RawArg::from),
            TargetAbi::X64 => memory.read_u64(addr),
        }
    }

    /// Bytes `waveOutWrite` pops on return: three stdcall arguments on
    /// 32-bit, nothing on 64-bit.
    fn wave_out_write_stack_adjust(self) -> u32 {
        match self {
            TargetAbi::X86 => 12,
            TargetAbi::X64 => 0,
        }
    }
}

fn bits_format(bits: u16) -> Option<SampleFormat> {
    match bits {
        8 => Some(SampleFormat::U8),
        16 => Some(SampleFormat::S16Le),
        32 => Some(SampleFormat::S32Le),
        _ => None,
    }
}

/// Captures waveOut playback into a [`CaptureSession`].
pub struct WaveTapTool {
    session: Arc<CaptureSession>,
    abi: TargetAbi,
    known_event: Arc<Mutex<Option<RawArg>>>,
}

impl WaveTapTool {
    /// Capture into an already-open session.
    pub fn new(session: Arc<CaptureSession>, abi: TargetAbi) -> Self {
        WaveTapTool {
            session,
            abi,
            known_event: Arc::new(Mutex::new(None)),
        }
    }

    /// Open a session configured from [`CaptureConfig::ENV_VAR`].
    pub fn from_env(abi: TargetAbi) -> Result<Self, Error> {
        let config = CaptureConfig::from_env()?;
        Ok(Self::new(CaptureSession::open(&config)?, abi))
    }

    /// The session this tool captures into.
    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    /// The event handle `waveOutOpen` registered for completion, if any.
    pub fn known_event(&self) -> Option<RawArg> {
        *self.known_event.lock()
    }
}

impl Tool for WaveTapTool {
    fn name(&self) -> &'static str {
        "wavetap"
    }

    fn hooks(&self, _module: &Module) -> HookSet {
        let mut hooks = HookSet::new();

        let session = self.session.clone();
        let known_event = self.known_event.clone();
        hooks.wrap_pre("waveOutOpen", move |call| {
            let wfx = call.arg(2);
            let callback = call.arg(3);
            let open_flags = call.arg(5);
            let memory = call.memory();
            let channels = memory.read_u16(wfx + WFX_CHANNELS_OFFSET)?;
            let rate = memory.read_u32(wfx + WFX_SAMPLES_PER_SEC_OFFSET)?;
            let bits = memory.read_u16(wfx + WFX_BITS_PER_SAMPLE_OFFSET)?;
            match bits_format(bits) {
                Some(format) => session.set_format(format),
                None => warn!(bits, "unrecognized sample width, ignored"),
            }
            session.set_channels(channels as u32);
            session.set_rate(rate);
            match open_flags & CALLBACK_TYPEMASK {
                CALLBACK_EVENT => {
                    debug!("completion event {callback:#x}");
                    *known_event.lock() = Some(callback);
                }
                CALLBACK_FUNCTION => {
                    return Err(Error::UnsupportedCallShape {
                        symbol: "waveOutOpen".into(),
                        reason: "completion by callback function".into(),
                    });
                }
                _ => {}
            }
            Ok(())
        });

        let session = self.session.clone();
        let abi = self.abi;
        hooks.wrap_pre("waveOutWrite", move |call| {
            let hdr = call.arg(1);
            let memory = call.memory();
            let data = abi.read_ptr(&*memory, hdr)?;
            let len = memory.read_u32(hdr + abi.hdr_len_offset())?;
            let payload = memory.read_bytes(data, len as usize)?;
            // Mark the header done in place so the application's polling
            // loop moves on to the next buffer.
            let hdr_flags = memory.read_u32(hdr + abi.hdr_flags_offset())?;
            memory.write_u32(
                hdr + abi.hdr_flags_offset(),
                hdr_flags | WaveHdrFlags::DONE.bits(),
            )?;
            session.capture(&payload)?;
            call.skip_call(MMSYSERR_NOERROR, abi.wave_out_write_stack_adjust());
            Ok(())
        });

        let known_event = self.known_event.clone();
        hooks.wrap_pre("WaitForSingleObject", move |call| {
            let handle = call.arg(0);
            if Some(handle) == *known_event.lock() {
                trace!("wait on the completion event {handle:#x}");
            }
            Ok(())
        });

        hooks
    }

    fn on_exit(&self) -> Result<(), Error> {
        self.session.close()
    }
}
