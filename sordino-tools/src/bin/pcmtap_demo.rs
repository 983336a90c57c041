/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Drives pcmtap through the rig with a synthesized sine wave.
//!
//! The rig plays an ALSA application: it negotiates a stream, then writes
//! a tone period by period. Every write is captured and skipped, so the
//! run is silent and leaves a decodable capture file behind.

use std::f64::consts::PI;
use std::path::PathBuf;

use clap::Parser;
use sordino::logging;
use sordino::rig::Rig;
use sordino::CaptureConfig;
use sordino::CaptureSession;
use sordino::Harness;
use sordino_tools::pcmtap;
use sordino_tools::PcmTapTool;

const RATE: u32 = 48_000;
const CHANNELS: u32 = 2;
const FRAMES_PER_PERIOD: usize = 1024;

/// Capture a synthesized tone through the pcmtap tool.
#[derive(Debug, Parser)]
struct Args {
    /// Where to write the captured PCM.
    #[arg(long, default_value = "output.pcm")]
    output: PathBuf,

    /// Log file. Logs go to stderr if not set.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Tone frequency in Hz.
    #[arg(long, default_value_t = 440.0)]
    freq: f64,

    /// Seconds of audio to synthesize.
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,
}

fn sine_period(freq: f64, start_frame: u64, frames: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(frames * CHANNELS as usize * 2);
    for i in 0..frames {
        let t = (start_frame + i as u64) as f64 / f64::from(RATE);
        let sample = (0.3 * f64::from(i16::MAX) * (2.0 * PI * freq * t).sin()) as i16;
        for _ in 0..CHANNELS {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
    }
    buf
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_guard = logging::init_tracing(args.log_file.as_deref());

    let config = CaptureConfig {
        output: args.output.clone(),
    };
    let session = CaptureSession::open(&config)?;
    let harness = Harness::new(PcmTapTool::new(session));

    let mut rig = Rig::new();
    let alsa = rig.add_module(
        "libasound.so.2",
        &[
            "snd_pcm_hw_params_set_format",
            "snd_pcm_hw_params_set_channels",
            "__snd_pcm_hw_params_set_rate_near",
            "snd_pcm_writei",
            "snd_pcm_wait",
            "snd_pcm_recover",
        ],
    );
    rig.load_module(&harness, &alsa)?;

    // Negotiate the stream like an ALSA application would.
    rig.call(
        "snd_pcm_hw_params_set_format",
        &[0, 0, pcmtap::SND_PCM_FORMAT_S16_LE],
    )?;
    rig.call("snd_pcm_hw_params_set_channels", &[0, 0, u64::from(CHANNELS)])?;
    let rate_ptr = rig.memory().alloc_bytes(&RATE.to_le_bytes());
    rig.call("__snd_pcm_hw_params_set_rate_near", &[0, 0, rate_ptr, 0])?;

    let total_frames = (args.seconds * f64::from(RATE)).max(0.0) as u64;
    let mut frame = 0u64;
    while frame < total_frames {
        let frames = FRAMES_PER_PERIOD.min((total_frames - frame) as usize);
        rig.call("snd_pcm_wait", &[0, 1000])?;
        let period = sine_period(args.freq, frame, frames);
        let buffer = rig.memory().alloc_bytes(&period);
        let written = rig.call("snd_pcm_writei", &[0, buffer, frames as u64])?;
        frame += written;
    }

    let bytes = harness.tool().session().bytes_captured();
    rig.shutdown(&harness)?;

    let stats = harness.stats();
    println!(
        "captured {} bytes into {} ({} hooks installed, {} symbols skipped)",
        bytes,
        args.output.display(),
        stats.hooks_installed,
        stats.symbols_skipped
    );
    println!(
        "play it back with: ffplay -f s16le -ar {} -ac {} {}",
        RATE,
        CHANNELS,
        args.output.display()
    );

    // Flush logs before exiting.
    drop(log_guard);
    Ok(())
}
