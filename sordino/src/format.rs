/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Sample formats and negotiated stream parameters.

use std::path::Path;

use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

/// PCM sample encodings the capture path understands.
///
/// API-specific format codes (ALSA enum values, PulseAudio enum values,
/// bits-per-sample fields) are translated into this type by the tool that
/// knows the API; everything downstream of that translation is generic.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    #[display("u8")]
    U8,
    /// Signed 16-bit little-endian.
    #[display("s16le")]
    S16Le,
    /// Signed 32-bit little-endian.
    #[display("s32le")]
    S32Le,
    /// 32-bit float little-endian.
    #[display("f32le")]
    F32Le,
}

impl SampleFormat {
    /// Width of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le => 2,
            SampleFormat::S32Le => 4,
            SampleFormat::F32Le => 4,
        }
    }

    /// Name understood by common playback tools (`ffplay -f <name>`).
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S32Le => "s32le",
            SampleFormat::F32Le => "f32le",
        }
    }
}

/// Stream parameters collected while watching configuration calls.
///
/// Each field is observed independently and in whatever order the target
/// negotiates them. A field is `None` until its configuration call has been
/// seen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Sample encoding.
    pub format: Option<SampleFormat>,
    /// Interleaved channel count.
    pub channels: Option<u32>,
    /// Frames per second.
    pub rate: Option<u32>,
}

impl StreamParams {
    /// Byte length of `frames` frames under the current parameters.
    ///
    /// Returns `None` until both the format and the channel count are
    /// known; the rate never enters the formula. Overflow also yields
    /// `None` rather than a wrapped length.
    pub fn byte_len(&self, frames: u64) -> Option<usize> {
        let format = self.format?;
        let channels = self.channels?;
        let per_frame = format.bytes_per_sample().checked_mul(channels as usize)?;
        usize::try_from(frames).ok()?.checked_mul(per_frame)
    }

    /// True once every field has been observed.
    pub fn is_complete(&self) -> bool {
        self.format.is_some() && self.channels.is_some() && self.rate.is_some()
    }

    /// A ready-to-run playback command line for the captured bytes, once
    /// enough parameters are known to form one.
    pub fn decode_hint(&self, output: &Path) -> Option<String> {
        let format = self.format?;
        let rate = self.rate?;
        let channels = self.channels?;
        Some(format!(
            "ffplay -f {} -ar {} -ac {} {}",
            format.name(),
            rate,
            channels,
            output.display()
        ))
    }
}
