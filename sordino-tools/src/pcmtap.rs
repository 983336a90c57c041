/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Taps ALSA and PulseAudio simple API playback into a raw PCM file.
//!
//! Configuration calls teach the tool the stream's shape: the sample
//! format and channel count feed the byte-length formula for interleaved
//! writes, and the rate completes the playback hint logged at exit. Write
//! calls are captured into the session's sink and then skipped with the
//! API's success result, so the real device stays silent while the target
//! believes every frame was played. Waits, recovery, and drains are
//! replaced outright with fixed results; with writes suppressed there is
//! nothing for them to do but block.
//!
//! The capture is headerless. Play it back with the logged hint, e.g.
//! `ffplay -f s16le -ar 48000 -ac 2 output.pcm`.

use std::sync::Arc;

use once_cell::sync::Lazy;
use sordino::CaptureConfig;
use sordino::CaptureSession;
use sordino::Error;
use sordino::HookSet;
use sordino::Module;
use sordino::RawArg;
use sordino::ReturnPolicy;
use sordino::SampleFormat;
use sordino::Tool;
use tracing::warn;

/// ALSA format code for signed 16-bit little-endian samples.
pub const SND_PCM_FORMAT_S16_LE: RawArg = 2;
/// ALSA format code for signed 32-bit little-endian samples.
pub const SND_PCM_FORMAT_S32_LE: RawArg = 10;

/// PulseAudio format code for signed 16-bit little-endian samples.
pub const PA_SAMPLE_S16LE: u32 = 3;
/// PulseAudio format code for 32-bit float little-endian samples.
pub const PA_SAMPLE_FLOAT32LE: u32 = 5;
/// PulseAudio format code for signed 32-bit little-endian samples.
pub const PA_SAMPLE_S32LE: u32 = 7;

// pa_sample_spec field offsets: format, rate, channels.
const PA_SPEC_FORMAT_OFFSET: RawArg = 0;
const PA_SPEC_RATE_OFFSET: RawArg = 4;
const PA_SPEC_CHANNELS_OFFSET: RawArg = 8;

static RETURN_POLICY: Lazy<ReturnPolicy> = Lazy::new(|| {
    let mut policy = ReturnPolicy::new();
    // snd_pcm_wait reports "ready"; the others report success.
    policy
        .fix("snd_pcm_wait", 1)
        .fix("snd_pcm_recover", 0)
        .fix("pa_simple_drain", 0);
    policy
});

/// The functions pcmtap neutralizes outright, with their fixed results.
pub fn return_policy() -> &'static ReturnPolicy {
    &RETURN_POLICY
}

fn alsa_format(code: RawArg) -> Option<SampleFormat> {
    match code {
        SND_PCM_FORMAT_S16_LE => Some(SampleFormat::S16Le),
        SND_PCM_FORMAT_S32_LE => Some(SampleFormat::S32Le),
        _ => None,
    }
}

fn pulse_format(code: u32) -> Option<SampleFormat> {
    match code {
        PA_SAMPLE_S16LE => Some(SampleFormat::S16Le),
        PA_SAMPLE_FLOAT32LE => Some(SampleFormat::F32Le),
        PA_SAMPLE_S32LE => Some(SampleFormat::S32Le),
        _ => None,
    }
}

/// Captures ALSA and PulseAudio playback into a [`CaptureSession`].
pub struct PcmTapTool {
    session: Arc<CaptureSession>,
}

impl PcmTapTool {
    /// Capture into an already-open session.
    pub fn new(session: Arc<CaptureSession>) -> Self {
        PcmTapTool { session }
    }

    /// Open a session configured from [`CaptureConfig::ENV_VAR`].
    pub fn from_env() -> Result<Self, Error> {
        let config = CaptureConfig::from_env()?;
        Ok(Self::new(CaptureSession::open(&config)?))
    }

    /// The session this tool captures into.
    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    fn alsa_hooks(&self) -> HookSet {
        let mut hooks = HookSet::new();

        let session = self.session.clone();
        hooks.wrap_pre("snd_pcm_hw_params_set_format", move |call| {
            let code = call.arg(2);
            match alsa_format(code) {
                Some(format) => session.set_format(format),
                None => warn!(code, "unrecognized ALSA sample format, ignored"),
            }
            Ok(())
        });

        let session = self.session.clone();
        hooks.wrap_pre("snd_pcm_hw_params_set_channels", move |call| {
            session.set_channels(call.arg(2) as u32);
            Ok(())
        });

        let session = self.session.clone();
        hooks.wrap_pre("snd_pcm_hw_params_set_rate", move |call| {
            session.set_rate(call.arg(2) as u32);
            Ok(())
        });

        // The _near variant takes the rate by pointer so the library can
        // write back the rate it actually granted.
        let session = self.session.clone();
        hooks.wrap_pre("__snd_pcm_hw_params_set_rate_near", move |call| {
            let ptr = call.arg(2);
            let rate = call.memory().read_u32(ptr)?;
            session.set_rate(rate);
            Ok(())
        });

        let session = self.session.clone();
        hooks.wrap_pre("snd_pcm_writei", move |call| {
            let buffer = call.arg(1);
            let frames = call.arg(2);
            match session.params().byte_len(frames) {
                Some(len) => {
                    let payload = call.memory().read_bytes(buffer, len)?;
                    session.capture(&payload)?;
                }
                None => {
                    session.note_dropped();
                    warn!(frames, "write before format and channels are known, dropped");
                }
            }
            // The caller sees every frame accepted.
            call.skip_call(frames, 0);
            Ok(())
        });

        hooks
    }

    fn pulse_hooks(&self) -> HookSet {
        let mut hooks = HookSet::new();

        // The whole stream shape arrives at once in the pa_sample_spec.
        let session = self.session.clone();
        hooks.wrap_pre("pa_simple_new", move |call| {
            let spec = call.arg(5);
            let memory = call.memory();
            let code = memory.read_u32(spec + PA_SPEC_FORMAT_OFFSET)?;
            let rate = memory.read_u32(spec + PA_SPEC_RATE_OFFSET)?;
            let channels = memory.read_u8(spec + PA_SPEC_CHANNELS_OFFSET)?;
            match pulse_format(code) {
                Some(format) => session.set_format(format),
                None => warn!(code, "unrecognized PulseAudio sample format, ignored"),
            }
            session.set_rate(rate);
            session.set_channels(channels as u32);
            Ok(())
        });

        let session = self.session.clone();
        hooks.wrap_pre("pa_simple_write", move |call| {
            let data = call.arg(1);
            let len = call.arg(2) as usize;
            let payload = call.memory().read_bytes(data, len)?;
            session.capture(&payload)?;
            call.skip_call(0, 0);
            Ok(())
        });

        hooks
    }
}

impl Tool for PcmTapTool {
    fn name(&self) -> &'static str {
        "pcmtap"
    }

    fn hooks(&self, _module: &Module) -> HookSet {
        let mut hooks = self.alsa_hooks() | self.pulse_hooks();
        RETURN_POLICY.apply(&mut hooks);
        hooks
    }

    fn on_exit(&self) -> Result<(), Error> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use sordino::Module;

    use super::*;

    #[test]
    fn hook_set_covers_both_families() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig {
            output: dir.path().join("output.pcm"),
        };
        let tool = PcmTapTool::new(CaptureSession::open(&config).unwrap());
        let hooks = tool.hooks(&Module::new("libasound.so.2", "/lib/libasound.so.2", 0));
        assert_eq!(hooks.len(), 10);
        let symbols: Vec<&str> = hooks.iter().map(|t| t.symbol.as_str()).collect();
        assert!(symbols.contains(&"snd_pcm_writei"));
        assert!(symbols.contains(&"__snd_pcm_hw_params_set_rate_near"));
        assert!(symbols.contains(&"pa_simple_write"));
        assert!(symbols.contains(&"snd_pcm_wait"));
    }

    #[test]
    fn format_codes_map() {
        assert_eq!(alsa_format(SND_PCM_FORMAT_S16_LE), Some(SampleFormat::S16Le));
        assert_eq!(alsa_format(SND_PCM_FORMAT_S32_LE), Some(SampleFormat::S32Le));
        assert_eq!(alsa_format(99), None);
        assert_eq!(pulse_format(PA_SAMPLE_S16LE), Some(SampleFormat::S16Le));
        assert_eq!(pulse_format(PA_SAMPLE_FLOAT32LE), Some(SampleFormat::F32Le));
        assert_eq!(pulse_format(PA_SAMPLE_S32LE), Some(SampleFormat::S32Le));
        assert_eq!(pulse_format(99), None);
    }

    #[test]
    fn policy_sentinels() {
        let policy = return_policy();
        assert_eq!(policy.result_for("snd_pcm_wait"), Some(1));
        assert_eq!(policy.result_for("snd_pcm_recover"), Some(0));
        assert_eq!(policy.result_for("pa_simple_drain"), Some(0));
        assert_eq!(policy.len(), 3);
    }
}
