// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rig-adapters: target connectivity
//!
//! The engine talks to targets through the [`TargetSession`] trait; the
//! production implementation runs SSH with a lazy SFTP subchannel and
//! auto-reconnect, and tests swap in a scripted fake.

pub mod target;

pub use target::{
    SessionError, SessionFactory, SessionHooks, SshSession, SshSessionFactory, TargetConfig,
    TargetSession,
};

#[cfg(any(test, feature = "test-support"))]
pub use target::{FakeScript, FakeSessionFactory, FakeTarget, ScriptedResult, TargetCall};
