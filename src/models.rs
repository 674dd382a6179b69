// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Record trait and the static schema describing how each field is stored.
//!
//! A record type declares its schema once, as a constant:
//!
//! ```rust
//! use git_data_store::{FieldSpec, Record, Schema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Account {
//!     name: String,
//!     #[serde(default)]
//!     tags: Vec<String>,
//!     password: Option<String>,
//!     logins: u32,
//! }
//!
//! impl Record for Account {
//!     const SCHEMA: Schema = Schema::new(&[
//!         FieldSpec::text("name").cached(),
//!         FieldSpec::structured("tags"),
//!         FieldSpec::text("password").secret("accounts"),
//!         FieldSpec::primitive("logins"),
//!     ])
//!     .repository_name("accounts");
//! }
//! ```

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default secret name used by field and object encryption.
pub const DEFAULT_SECRET_NAME: &str = "secret";

/// Storage kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Booleans and numbers. Always retained in the cached mirror.
    Primitive,
    /// String values. The only kind that supports field encryption.
    Text,
    /// Anything else (collections, nested structs, optionals of those).
    Structured,
}

/// Declared role of a single record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    secret: Option<&'static str>,
    cached: bool,
}

impl FieldSpec {
    const fn with_kind(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            secret: None,
            cached: false,
        }
    }

    /// A boolean or numeric field.
    pub const fn primitive(name: &'static str) -> Self {
        Self::with_kind(name, FieldKind::Primitive)
    }

    /// A string field.
    pub const fn text(name: &'static str) -> Self {
        Self::with_kind(name, FieldKind::Text)
    }

    /// Any other field.
    pub const fn structured(name: &'static str) -> Self {
        Self::with_kind(name, FieldKind::Structured)
    }

    /// Encrypt this field at rest with the named secret.
    pub const fn secret(mut self, secret_name: &'static str) -> Self {
        self.secret = Some(secret_name);
        self
    }

    /// Retain this field in the cached mirror.
    pub const fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Serialized field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Secret name, if the field is encrypted at rest.
    pub fn secret_name(&self) -> Option<&'static str> {
        self.secret
    }

    /// Whether the field is tagged as cached.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Whether the cached mirror keeps this field.
    pub fn is_retained_in_cache(&self) -> bool {
        self.kind == FieldKind::Primitive || self.cached
    }
}

/// Static description of a record type.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    repository_name: Option<&'static str>,
    object_secret: Option<&'static str>,
    fields: &'static [FieldSpec],
}

impl Schema {
    /// Schema with the given fields, default directory name and no
    /// whole-object encryption.
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self {
            repository_name: None,
            object_secret: None,
            fields,
        }
    }

    /// Store records under an explicit directory name.
    pub const fn repository_name(mut self, name: &'static str) -> Self {
        self.repository_name = Some(name);
        self
    }

    /// Encrypt the whole record with the named secret.
    pub const fn encrypted_with(mut self, secret_name: &'static str) -> Self {
        self.object_secret = Some(secret_name);
        self
    }

    /// Explicit directory name, if set.
    pub fn repository_name_override(&self) -> Option<&'static str> {
        self.repository_name
    }

    /// Secret name for whole-object encryption.
    pub fn object_secret(&self) -> Option<&'static str> {
        self.object_secret
    }

    /// Declared fields.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Fields encrypted at rest.
    pub fn secret_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.secret.is_some())
    }

    /// Whether any field is tagged as cached.
    pub fn has_cached_fields(&self) -> bool {
        self.fields.iter().any(|f| f.cached)
    }

    /// Look up a field by serialized name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A record type that can be persisted by the data manager.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Field roles, directory name and encryption policy.
    const SCHEMA: Schema;

    /// Directory name for records of this type.
    fn repository_name() -> Cow<'static, str> {
        match Self::SCHEMA.repository_name_override() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Borrowed(short_type_name(std::any::type_name::<Self>())),
        }
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
