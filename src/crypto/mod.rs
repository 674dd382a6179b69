// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Record encryption primitives.

pub mod cipher;
pub mod kdf;
pub mod secrets;

pub use cipher::{Cipher, CipherError};
pub use kdf::KeyDerivation;
pub use secrets::SecretStore;
