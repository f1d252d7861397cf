// Copyright (c) 2025 Whatsmeow-rs Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # whatsmeow-rs
//!
//! Media cryptography and transport core for a WhatsApp-compatible client:
//! per-media key derivation, streaming AES-256-CBC + HMAC-SHA256
//! encrypt/decrypt (including ranged download), multi-host upload
//! dispatch, and the AES-256-GCM "media retry" signaling sub-protocol.
//!
//! This is a focused port of the media-handling corner of the Go library
//! [whatsmeow](https://github.com/tulir/whatsmeow); the surrounding
//! authentication, Signal protocol, and connection layers are external
//! collaborators, not part of this crate.

pub mod binary;
pub mod error;
pub mod media;
pub mod types;
pub mod util;

pub use error::{Error, Result};
pub use types::*;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
