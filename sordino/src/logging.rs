/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Tracing setup shared by the capture tools.

use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the log file, for embeddings that cannot
/// pass one programmatically.
pub const LOG_FILE_ENV: &str = "RUST_LOG_FILE";

/// Initialize the global tracing subscriber, filtered by `RUST_LOG`.
///
/// With a log file the subscriber writes through a non-blocking appender;
/// hold the returned guard until exit or trailing events are lost. Without
/// one (or if no fresh file can be created) logs go to stderr and no guard
/// is needed.
pub fn init_tracing(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    fn set_subscriber_with_writer<W>(writer: W)
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(writer)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Unable to set global tracing subscriber");
    }

    if let Some(file_name) = log_file {
        // Try to create a unique file. A timestamp suffix keeps reruns
        // from clobbering the log of the run before.
        for i in 0..100 {
            let mut file_name = file_name.to_path_buf();
            if i > 0 {
                let mut name = file_name.file_name().map_or_else(
                    || std::ffi::OsString::from("log"),
                    |name| name.to_os_string(),
                );
                name.push(chrono::Local::now().format(".%Y%m%d.%H%M%S.%f").to_string());
                file_name.set_file_name(name);
            }
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&file_name)
            {
                Ok(file) => {
                    let (writer, guard) = tracing_appender::non_blocking(file);
                    set_subscriber_with_writer(writer);
                    eprintln!(" [sordino] logging to {}", file_name.display());
                    return Some(guard);
                }
                Err(_) => continue,
            }
        }
        eprintln!(" [sordino] unable to create freshly named log file, logging to stderr");
    }
    set_subscriber_with_writer(std::io::stderr);
    None
}

/// Like [`init_tracing`], with the log file taken from [`LOG_FILE_ENV`].
pub fn init_tracing_from_env() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let file = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from);
    init_tracing(file.as_deref())
}
