/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Drives the pcmtap tool through the rig against scripted ALSA and
//! PulseAudio sessions.

use std::sync::Arc;

use sordino::rig::Rig;
use sordino::CaptureConfig;
use sordino::CaptureSession;
use sordino::Harness;
use sordino::SampleFormat;
use sordino_tools::pcmtap;
use sordino_tools::PcmTapTool;
use tempfile::TempDir;

const ALSA_EXPORTS: &[&str] = &[
    "snd_pcm_hw_params_set_format",
    "snd_pcm_hw_params_set_channels",
    "snd_pcm_hw_params_set_rate",
    "__snd_pcm_hw_params_set_rate_near",
    "snd_pcm_writei",
    "snd_pcm_wait",
    "snd_pcm_recover",
];

const PULSE_EXPORTS: &[&str] = &["pa_simple_new", "pa_simple_write", "pa_simple_drain"];

fn open_session(dir: &TempDir) -> Arc<CaptureSession> {
    let config = CaptureConfig {
        output: dir.path().join("output.pcm"),
    };
    CaptureSession::open(&config).unwrap()
}

#[test]
fn interleaved_writes_are_captured_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();
    rig.set_original("snd_pcm_writei", |_args| panic!("device must stay silent"));

    rig.call(
        "snd_pcm_hw_params_set_format",
        &[0, 0, pcmtap::SND_PCM_FORMAT_S16_LE],
    )
    .unwrap();
    rig.call("snd_pcm_hw_params_set_channels", &[0, 0, 2]).unwrap();

    // 1024 frames of s16le stereo is 4096 bytes.
    let pcm: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
    let buffer = rig.memory().alloc_bytes(&pcm);
    let written = rig.call("snd_pcm_writei", &[0, buffer, 1024]).unwrap();

    assert_eq!(written, 1024);
    assert_eq!(rig.last_skip(), Some((1024, 0)));
    assert_eq!(rig.original_calls("snd_pcm_writei"), 0);
    assert_eq!(session.bytes_captured(), 4096);
    session.close().unwrap();
    assert_eq!(std::fs::read(dir.path().join("output.pcm")).unwrap(), pcm);
}

#[test]
fn wide_formats_change_the_byte_formula() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();

    rig.call(
        "snd_pcm_hw_params_set_format",
        &[0, 0, pcmtap::SND_PCM_FORMAT_S32_LE],
    )
    .unwrap();
    rig.call("snd_pcm_hw_params_set_channels", &[0, 0, 4]).unwrap();

    // 100 frames of 4-channel s32le is 1600 bytes.
    let pcm = vec![0x5au8; 1600];
    let buffer = rig.memory().alloc_bytes(&pcm);
    assert_eq!(rig.call("snd_pcm_writei", &[0, buffer, 100]).unwrap(), 100);
    assert_eq!(session.bytes_captured(), 1600);
}

#[test]
fn writes_before_configuration_are_dropped_but_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();

    let buffer = rig.memory().alloc_bytes(&[7u8; 64]);
    let written = rig.call("snd_pcm_writei", &[0, buffer, 16]).unwrap();

    // The caller still sees its frames accepted; nothing hit the file.
    assert_eq!(written, 16);
    assert_eq!(rig.last_skip(), Some((16, 0)));
    assert_eq!(session.bytes_captured(), 0);
    assert_eq!(session.payloads_dropped(), 1);
}

#[test]
fn unknown_format_drops_until_a_recognized_one_arrives() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();

    rig.call("snd_pcm_hw_params_set_format", &[0, 0, 77]).unwrap();
    rig.call("snd_pcm_hw_params_set_channels", &[0, 0, 2]).unwrap();
    assert_eq!(session.params().format, None);

    let buffer = rig.memory().alloc_bytes(&[1u8; 32]);
    assert_eq!(rig.call("snd_pcm_writei", &[0, buffer, 8]).unwrap(), 8);
    assert_eq!(session.payloads_dropped(), 1);
    assert_eq!(session.bytes_captured(), 0);

    rig.call(
        "snd_pcm_hw_params_set_format",
        &[0, 0, pcmtap::SND_PCM_FORMAT_S16_LE],
    )
    .unwrap();
    assert_eq!(rig.call("snd_pcm_writei", &[0, buffer, 8]).unwrap(), 8);
    assert_eq!(session.bytes_captured(), 32);
}

#[test]
fn zero_frame_writes_touch_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();

    rig.call(
        "snd_pcm_hw_params_set_format",
        &[0, 0, pcmtap::SND_PCM_FORMAT_S16_LE],
    )
    .unwrap();
    rig.call("snd_pcm_hw_params_set_channels", &[0, 0, 2]).unwrap();

    // A null buffer is fine when there are no bytes to read.
    assert_eq!(rig.call("snd_pcm_writei", &[0, 0, 0]).unwrap(), 0);
    assert_eq!(session.bytes_captured(), 0);
    assert_eq!(session.payloads_dropped(), 0);
}

#[test]
fn rate_arrives_by_value_or_by_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();

    rig.call("snd_pcm_hw_params_set_rate", &[0, 0, 22_050, 0]).unwrap();
    assert_eq!(session.params().rate, Some(22_050));

    let rate_ptr = rig.memory().alloc_bytes(&44_100u32.to_le_bytes());
    rig.call("__snd_pcm_hw_params_set_rate_near", &[0, 0, rate_ptr, 0])
        .unwrap();
    assert_eq!(session.params().rate, Some(44_100));
}

#[test]
fn neutralized_calls_return_their_sentinels() {
    assert_eq!(
        pcmtap::return_policy().iter().collect::<Vec<_>>(),
        vec![
            ("pa_simple_drain", 0),
            ("snd_pcm_recover", 0),
            ("snd_pcm_wait", 1),
        ]
    );

    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session));
    let mut rig = Rig::new();
    let alsa = rig.add_module("libasound.so.2", ALSA_EXPORTS);
    let pulse = rig.add_module("libpulse-simple.so.0", PULSE_EXPORTS);
    rig.load_module(&harness, &alsa).unwrap();
    rig.load_module(&harness, &pulse).unwrap();
    rig.set_original("snd_pcm_wait", |_args| panic!("must not wait"));
    rig.set_original("snd_pcm_recover", |_args| panic!("must not recover"));
    rig.set_original("pa_simple_drain", |_args| panic!("must not drain"));

    assert_eq!(rig.call("snd_pcm_wait", &[0, 1000]).unwrap(), 1);
    assert_eq!(rig.call("snd_pcm_recover", &[0, u64::MAX, 1]).unwrap(), 0);
    assert_eq!(rig.call("pa_simple_drain", &[0, 0]).unwrap(), 0);
}

#[test]
fn pulse_stream_shape_arrives_in_the_sample_spec() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let pulse = rig.add_module("libpulse-simple.so.0", PULSE_EXPORTS);
    rig.load_module(&harness, &pulse).unwrap();

    let mut spec = Vec::new();
    spec.extend_from_slice(&pcmtap::PA_SAMPLE_FLOAT32LE.to_le_bytes());
    spec.extend_from_slice(&44_100u32.to_le_bytes());
    spec.push(1);
    let spec_ptr = rig.memory().alloc_bytes(&spec);
    rig.call("pa_simple_new", &[0, 0, 1, 0, 0, spec_ptr, 0, 0, 0])
        .unwrap();

    let params = session.params();
    assert_eq!(params.format, Some(SampleFormat::F32Le));
    assert_eq!(params.rate, Some(44_100));
    assert_eq!(params.channels, Some(1));
    // pa_simple_new itself still runs; only writes are suppressed.
    assert_eq!(rig.original_calls("pa_simple_new"), 1);
}

#[test]
fn pulse_writes_carry_an_explicit_length() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let pulse = rig.add_module("libpulse-simple.so.0", PULSE_EXPORTS);
    rig.load_module(&harness, &pulse).unwrap();
    rig.set_original("pa_simple_write", |_args| panic!("device must stay silent"));

    // No configuration calls at all: the explicit length needs none.
    let payload = vec![0xaau8; 256];
    let data = rig.memory().alloc_bytes(&payload);
    assert_eq!(rig.call("pa_simple_write", &[0, data, 256, 0]).unwrap(), 0);
    assert_eq!(rig.last_skip(), Some((0, 0)));
    assert_eq!(session.bytes_captured(), 256);
    session.close().unwrap();
    assert_eq!(std::fs::read(dir.path().join("output.pcm")).unwrap(), payload);
}

#[test]
fn unrelated_modules_install_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session));
    let mut rig = Rig::new();
    let ssl = rig.add_module("libssl.so.3", &["SSL_read", "SSL_write"]);
    rig.load_module(&harness, &ssl).unwrap();

    let stats = harness.stats();
    assert_eq!(stats.hooks_installed, 0);
    // Five ALSA wraps, two PulseAudio wraps, three replacements.
    assert_eq!(stats.symbols_skipped, 10);
}

#[test]
fn exit_closes_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    let harness = Harness::new(PcmTapTool::new(session.clone()));
    let mut rig = Rig::new();
    let pulse = rig.add_module("libpulse-simple.so.0", PULSE_EXPORTS);
    rig.load_module(&harness, &pulse).unwrap();

    let data = rig.memory().alloc_bytes(&[1, 2, 3, 4]);
    rig.call("pa_simple_write", &[0, data, 4, 0]).unwrap();
    rig.shutdown(&harness).unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("output.pcm")).unwrap(),
        vec![1, 2, 3, 4]
    );
    // The sink is gone; a straggling write is dropped, not an error.
    assert_eq!(session.capture(&[9]).unwrap(), 0);
}

#[test]
fn session_configured_from_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("env.pcm");
    std::env::set_var(
        CaptureConfig::ENV_VAR,
        format!(r#"{{"output":"{}"}}"#, output.display()),
    );
    let tool = PcmTapTool::from_env().unwrap();
    std::env::remove_var(CaptureConfig::ENV_VAR);

    assert_eq!(tool.session().output_path(), output);
    assert!(output.exists());
}
