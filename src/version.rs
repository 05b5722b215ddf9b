// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Process-wide codec version selection.
//!
//! One version is active at a time. [`scoped`] switches to another version
//! and hands back a guard that restores the previous one on drop. Dropping
//! a guard also closes every scope opened after it, so guards dropped out of
//! order still leave the right version active. Each version resolves to a
//! [`CodecBridge`]; every version is served by [`BaselineCodec`] until a
//! different bridge is installed with [`register`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::bridge::{BaselineCodec, CodecBridge};
use crate::error::{Error, Result};

macro_rules! versions {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        /// A codec library build the bridge can be selected by.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Version {
            $($variant,)+
        }

        impl Version {
            /// Every known version, oldest first per family.
            pub const ALL: &'static [Version] = &[$(Version::$variant,)+];

            /// Tag as used on the command line and in file names (`"6b"`,
            /// `"turbo210"`).
            pub fn tag(self) -> &'static str {
                match self {
                    $(Version::$variant => $tag,)+
                }
            }
        }
    };
}

versions! {
    V6b => "6b",
    V7 => "7",
    V8 => "8",
    V8a => "8a",
    V8b => "8b",
    V8c => "8c",
    V8d => "8d",
    V9 => "9",
    V9a => "9a",
    V9b => "9b",
    V9c => "9c",
    V9d => "9d",
    V9e => "9e",
    Turbo120 => "turbo120",
    Turbo130 => "turbo130",
    Turbo140 => "turbo140",
    Turbo150 => "turbo150",
    Turbo200 => "turbo200",
    Turbo210 => "turbo210",
    Mozjpeg101 => "mozjpeg101",
    Mozjpeg201 => "mozjpeg201",
    Mozjpeg300 => "mozjpeg300",
    Mozjpeg403 => "mozjpeg403",
}

impl Default for Version {
    fn default() -> Self {
        Self::V6b
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.tag() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown codec version {s:?}")))
    }
}

/// Active version, the stack of versions saved by open scopes, and the
/// bridge registry.
pub struct VersionContext {
    active: Version,
    saved: Vec<Version>,
    bridges: HashMap<Version, Arc<dyn CodecBridge>>,
    fallback: Arc<dyn CodecBridge>,
}

impl VersionContext {
    pub fn new() -> Self {
        Self {
            active: Version::default(),
            saved: Vec::new(),
            bridges: HashMap::new(),
            fallback: Arc::new(BaselineCodec::new()),
        }
    }

    pub fn active(&self) -> Version {
        self.active
    }

    pub fn set(&mut self, version: Version) {
        self.active = version;
    }

    /// Save the active version and switch to `version`.
    pub fn push(&mut self, version: Version) {
        self.saved.push(self.active);
        self.active = version;
    }

    /// Close every scope opened at `depth` or deeper, restoring the version
    /// that was active before the one at `depth`. `None` if those scopes are
    /// already closed.
    pub fn unwind_to(&mut self, depth: usize) -> Option<Version> {
        let previous = *self.saved.get(depth)?;
        self.saved.truncate(depth);
        self.active = previous;
        Some(previous)
    }

    /// Number of scopes currently open.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn register(&mut self, version: Version, bridge: Arc<dyn CodecBridge>) {
        self.bridges.insert(version, bridge);
    }

    pub fn bridge_for(&self, version: Version) -> Arc<dyn CodecBridge> {
        self.bridges
            .get(&version)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn bridge(&self) -> Arc<dyn CodecBridge> {
        self.bridge_for(self.active)
    }
}

impl Default for VersionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn context() -> MutexGuard<'static, VersionContext> {
    static CONTEXT: OnceLock<Mutex<VersionContext>> = OnceLock::new();
    CONTEXT
        .get_or_init(|| Mutex::new(VersionContext::new()))
        .lock()
        // Every mutation is a single assignment, push or truncate; poisoning cannot tear it.
        .unwrap_or_else(PoisonError::into_inner)
}

/// Make `version` the active version.
pub fn set(version: Version) {
    let mut ctx = context();
    tracing::debug!(from = %ctx.active(), to = %version, "codec version set");
    ctx.set(version);
}

/// The active version.
pub fn get() -> Version {
    context().active()
}

/// Install `bridge` for `version`, replacing any previous registration.
pub fn register(version: Version, bridge: Arc<dyn CodecBridge>) {
    tracing::debug!(%version, bridge = bridge.name(), "codec bridge registered");
    context().register(version, bridge);
}

/// Bridge serving the active version.
pub fn bridge() -> Arc<dyn CodecBridge> {
    context().bridge()
}

/// Restores the version that was active when the guard was created.
#[must_use = "the previous version is restored when the guard is dropped"]
pub struct VersionGuard {
    version: Version,
    /// Scope depth before this guard's push.
    depth: usize,
}

impl VersionGuard {
    /// Version this scope activated.
    pub fn version(&self) -> Version {
        self.version
    }
}

impl Drop for VersionGuard {
    fn drop(&mut self) {
        let mut ctx = context();
        let closed = ctx.depth().saturating_sub(self.depth);
        if let Some(previous) = ctx.unwind_to(self.depth) {
            if closed > 1 {
                tracing::debug!(closed, "codec version scope closed before inner scopes");
            }
            tracing::trace!(from = %self.version, to = %previous, "codec version scope closed");
        }
    }
}

/// Switch to `version` until the returned guard is dropped.
pub fn scoped(version: Version) -> VersionGuard {
    let mut ctx = context();
    tracing::trace!(from = %ctx.active(), to = %version, "codec version scope opened");
    let depth = ctx.depth();
    ctx.push(version);
    VersionGuard { version, depth }
}

/// Run `f` with `version` active.
pub fn with_version<T>(version: Version, f: impl FnOnce() -> T) -> T {
    let _guard = scoped(version);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{CodecError, DecodeBuffers, EncodeRequest};
    use crate::info::JpegInfo;
    use std::path::Path;

    #[test]
    fn tags_roundtrip() {
        for &v in Version::ALL {
            assert_eq!(v.tag().parse::<Version>().unwrap(), v);
        }
        assert_eq!(Version::ALL.len(), 23);
        assert_eq!(Version::Turbo210.to_string(), "turbo210");
        assert_eq!(Version::default(), Version::V6b);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!("10".parse::<Version>(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn context_unwinds_in_stack_order() {
        let mut ctx = VersionContext::new();
        ctx.set(Version::V6b);
        ctx.push(Version::V8d);
        ctx.push(Version::V9d);
        assert_eq!(ctx.active(), Version::V9d);
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.unwind_to(1), Some(Version::V8d));
        assert_eq!(ctx.active(), Version::V8d);
        assert_eq!(ctx.unwind_to(0), Some(Version::V6b));
        assert_eq!(ctx.active(), Version::V6b);
        assert_eq!(ctx.unwind_to(0), None);
        assert_eq!(ctx.active(), Version::V6b);
    }

    #[test]
    fn unwinding_an_outer_scope_closes_inner_ones() {
        let mut ctx = VersionContext::new();
        ctx.set(Version::V6b);
        ctx.push(Version::V8d);
        ctx.push(Version::V9d);
        ctx.push(Version::V7);
        // Outer scope first: everything above it goes too.
        assert_eq!(ctx.unwind_to(0), Some(Version::V6b));
        assert_eq!(ctx.depth(), 0);
        // The inner scopes' later unwinds are no-ops.
        assert_eq!(ctx.unwind_to(2), None);
        assert_eq!(ctx.unwind_to(1), None);
        assert_eq!(ctx.active(), Version::V6b);
    }

    struct Named;

    impl CodecBridge for Named {
        fn name(&self) -> &str {
            "named"
        }

        fn read_info(&self, _src: &Path) -> std::result::Result<JpegInfo, CodecError> {
            Err(CodecError::InvalidSoi)
        }

        fn decode(&self, _src: &Path, _out: DecodeBuffers<'_>) -> std::result::Result<(), CodecError> {
            Err(CodecError::InvalidSoi)
        }

        fn encode(&self, _request: &EncodeRequest<'_>) -> std::result::Result<(), CodecError> {
            Err(CodecError::InvalidSoi)
        }
    }

    #[test]
    fn registry_falls_back_to_baseline() {
        let mut ctx = VersionContext::new();
        assert_eq!(ctx.bridge().name(), "baseline");
        ctx.register(Version::Mozjpeg403, Arc::new(Named));
        assert_eq!(ctx.bridge_for(Version::Mozjpeg403).name(), "named");
        assert_eq!(ctx.bridge_for(Version::V9e).name(), "baseline");
        ctx.set(Version::Mozjpeg403);
        assert_eq!(ctx.bridge().name(), "named");
    }
}
