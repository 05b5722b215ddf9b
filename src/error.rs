// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the DCT coefficient layer.
//!
//! [`Error`] is what callers of [`DctJpeg`](crate::DctJpeg) see. Failures
//! reported by a codec bridge are wrapped unchanged in [`Error::Codec`]
//! together with the operation and path that produced them.

use std::path::PathBuf;

use thiserror::Error;

use crate::bridge::CodecError;

/// Errors surfaced by the coefficient model, the layout converter and the
/// version selector.
#[derive(Error, Debug)]
pub enum Error {
    /// The codec bridge rejected the input or could not write the output.
    #[error("{op} failed for {}: {source}", path.display())]
    Codec {
        /// Bridge operation that failed (`read_info`, `decode`, `encode`).
        op: &'static str,
        /// File the bridge was working on.
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    /// A caller-supplied parameter is outside its contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is intentionally unsupported in this representation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Tensor or table shapes disagree at conversion time.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Reading a source file or preparing a scratch file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn codec(op: &'static str, path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Codec {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
