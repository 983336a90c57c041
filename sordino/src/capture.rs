/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Capture configuration and the shared capture session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::error::Error;
use crate::format::SampleFormat;
use crate::format::StreamParams;
use crate::sink::PcmSink;

/// Configuration for a capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Path of the raw PCM output file.
    pub output: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            output: PathBuf::from("output.pcm"),
        }
    }
}

impl CaptureConfig {
    /// Environment variable holding a JSON-encoded [`CaptureConfig`].
    pub const ENV_VAR: &'static str = "SORDINO_CONFIG";

    /// Load the configuration from [`Self::ENV_VAR`], falling back to the
    /// default when the variable is unset.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(Self::ENV_VAR) {
            Ok(raw) => {
                let config = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse ${} as JSON", Self::ENV_VAR))?;
                Ok(config)
            }
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(err) => Err(Error::Tool(
                anyhow::Error::new(err).context(format!("failed to read ${}", Self::ENV_VAR)),
            )),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    params: StreamParams,
    sink: Option<PcmSink>,
    payloads_dropped: u64,
}

/// Mutable capture state shared by every handler of a tool.
///
/// One session corresponds to one output file. The stream parameters and
/// the sink sit behind a single lock so that a parameter update can never
/// interleave with a payload append.
#[derive(Debug)]
pub struct CaptureSession {
    output: PathBuf,
    state: Mutex<SessionState>,
}

impl CaptureSession {
    /// Open the output sink and return the shared session handle.
    pub fn open(config: &CaptureConfig) -> Result<Arc<Self>, Error> {
        let sink = PcmSink::create(&config.output)?;
        info!(output = %config.output.display(), "capture session open");
        Ok(Arc::new(CaptureSession {
            output: config.output.clone(),
            state: Mutex::new(SessionState {
                params: StreamParams::default(),
                sink: Some(sink),
                payloads_dropped: 0,
            }),
        }))
    }

    /// Record the negotiated sample format.
    pub fn set_format(&self, format: SampleFormat) {
        info!(%format, "stream format");
        self.state.lock().params.format = Some(format);
    }

    /// Record the negotiated channel count.
    pub fn set_channels(&self, channels: u32) {
        info!(channels, "stream channels");
        self.state.lock().params.channels = Some(channels);
    }

    /// Record the negotiated sample rate.
    pub fn set_rate(&self, rate: u32) {
        info!(rate, "stream rate");
        self.state.lock().params.rate = Some(rate);
    }

    /// Snapshot of the parameters observed so far.
    pub fn params(&self) -> StreamParams {
        self.state.lock().params
    }

    /// Append a captured payload to the sink.
    ///
    /// Returns the running byte total. Appends after [`close`] are counted
    /// as drops rather than errors: a straggling write call in the target
    /// is the target's business, not a reason to abort teardown.
    ///
    /// [`close`]: Self::close
    pub fn capture(&self, payload: &[u8]) -> Result<u64, Error> {
        let mut state = self.state.lock();
        match state.sink.as_mut() {
            Some(sink) => {
                sink.append(payload)?;
                Ok(sink.bytes_written())
            }
            None => {
                state.payloads_dropped += 1;
                warn!(len = payload.len(), "payload after close, dropped");
                Ok(0)
            }
        }
    }

    /// Record a payload that had to be dropped before reaching the sink.
    pub fn note_dropped(&self) {
        self.state.lock().payloads_dropped += 1;
    }

    /// Payloads dropped instead of captured.
    pub fn payloads_dropped(&self) -> u64 {
        self.state.lock().payloads_dropped
    }

    /// Bytes appended to the sink so far.
    pub fn bytes_captured(&self) -> u64 {
        let state = self.state.lock();
        match state.sink.as_ref() {
            Some(sink) => sink.bytes_written(),
            None => 0,
        }
    }

    /// Path of the output file.
    pub fn output_path(&self) -> &std::path::Path {
        &self.output
    }

    /// Close the sink and log a capture summary. Idempotent.
    pub fn close(&self) -> Result<(), Error> {
        let (sink, params, dropped) = {
            let mut state = self.state.lock();
            let sink = state.sink.take();
            (sink, state.params, state.payloads_dropped)
        };
        let sink = match sink {
            Some(sink) => sink,
            None => return Ok(()),
        };
        let bytes = sink.close()?;
        info!(
            output = %self.output.display(),
            bytes,
            dropped,
            "capture session closed"
        );
        match params.decode_hint(&self.output) {
            Some(hint) => info!("play it back with: {hint}"),
            None => warn!("stream parameters incomplete, no playback hint"),
        }
        Ok(())
    }
}
