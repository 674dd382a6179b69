// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field-level and object-level encryption of record payloads.
//!
//! ## Write Order
//!
//! 1. Detach the record into a value tree (the caller's record is untouched).
//! 2. Encrypt every secret text field in place, prefixed with [`FIELD_MARKER`].
//! 3. If the type declares an object secret, serialize the tree and replace
//!    it with one string prefixed with [`OBJECT_MARKER`].
//!
//! Reading undoes the object layer first, then the field layer.
//!
//! ## Failure Policy
//!
//! | Situation | Write | Read |
//! |-----------|-------|------|
//! | Field secret missing | error | error |
//! | Object secret missing | warn, store cleartext | error |
//! | Secret on a non-text field | log, field untouched | log, field untouched |
//! | Wrong secret / tampered data | - | error |

use std::path::Path;

use serde_yml::Value;

use super::clone;
use super::envelope::Payload;
use crate::crypto::{Cipher, SecretStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{FieldKind, FieldSpec, Record, Schema};

/// Prefix of a whole-object ciphertext.
pub const OBJECT_MARKER: &str = "[git-data-lib-encrypted-data]";

/// Prefix of a single encrypted field value.
pub const FIELD_MARKER: &str = "[git-data-lib-encrypted-property]";

/// Encrypts and decrypts record payloads against a secret store.
pub struct RecordCodec<'a> {
    cipher: &'a Cipher,
    secrets: &'a SecretStore,
}

impl<'a> RecordCodec<'a> {
    /// Create a codec.
    pub fn new(cipher: &'a Cipher, secrets: &'a SecretStore) -> Self {
        Self { cipher, secrets }
    }

    /// Turn a record into its stored payload.
    pub fn encode<T: Record>(&self, record: &T) -> StoreResult<Payload> {
        let repository = T::repository_name();
        let mut value = clone::detach(record)?;

        self.encrypt_fields(&mut value, &T::SCHEMA, &repository)?;

        match self.encrypt_object(&value, &T::SCHEMA, &repository)? {
            Some(ciphertext) => Ok(Payload::Encrypted(ciphertext)),
            None => Ok(Payload::Typed(value)),
        }
    }

    /// Turn a stored payload back into a record.
    pub fn decode<T: Record>(&self, payload: Payload, path: &Path) -> StoreResult<T> {
        let repository = T::repository_name();

        let mut value = match payload {
            Payload::Encrypted(ciphertext) => {
                self.decrypt_object(&ciphertext, &T::SCHEMA, &repository, path)?
            }
            Payload::Typed(value) => value,
        };

        self.decrypt_fields(&mut value, &T::SCHEMA, &repository)?;

        serde_yml::from_value(value).map_err(|source| StoreError::Deserialization {
            path: path.to_path_buf(),
            source,
        })
    }

    fn resolve_field_secrets(
        &self,
        schema: &Schema,
        repository: &str,
    ) -> Result<Vec<(&'static FieldSpec, &'a str)>, (String, String)> {
        let mut resolved = Vec::new();
        for spec in schema.secret_fields() {
            let Some(secret_name) = spec.secret_name() else {
                continue;
            };
            match self.secrets.resolve(secret_name) {
                Some(secret) => resolved.push((spec, secret)),
                None => {
                    return Err((
                        format!("field {} of {repository}", spec.name()),
                        format!("unable to find secret \"{secret_name}\""),
                    ))
                }
            }
        }
        Ok(resolved)
    }

    fn encrypt_fields(&self, value: &mut Value, schema: &Schema, repository: &str) -> StoreResult<()> {
        let fields = self
            .resolve_field_secrets(schema, repository)
            .map_err(|(context, reason)| StoreError::encryption(context, reason))?;

        for (spec, secret) in fields {
            if spec.kind() != FieldKind::Text {
                tracing::error!(
                    field = spec.name(),
                    repository,
                    kind = ?spec.kind(),
                    "Field kind is not supported for encryption, value stays in cleartext"
                );
                continue;
            }

            let Some(field_value) = value.get_mut(spec.name()) else {
                continue;
            };

            match field_value {
                Value::Null => {}
                Value::String(plaintext) => {
                    tracing::debug!(field = spec.name(), repository, "Encrypting field");
                    let ciphertext = self
                        .cipher
                        .encrypt_string(plaintext, secret)
                        .map_err(|e| StoreError::encryption(format!("field {}", spec.name()), e))?;
                    *field_value = Value::String(format!("{FIELD_MARKER}{ciphertext}"));
                }
                _ => {
                    tracing::error!(
                        field = spec.name(),
                        repository,
                        "Field declared as text holds a non-string value, value stays in cleartext"
                    );
                }
            }
        }

        Ok(())
    }

    fn decrypt_fields(&self, value: &mut Value, schema: &Schema, repository: &str) -> StoreResult<()> {
        let fields = self
            .resolve_field_secrets(schema, repository)
            .map_err(|(context, reason)| StoreError::decryption(context, reason))?;

        for (spec, secret) in fields {
            if spec.kind() != FieldKind::Text {
                tracing::error!(
                    field = spec.name(),
                    repository,
                    kind = ?spec.kind(),
                    "Field kind is not supported for decryption, value left untouched"
                );
                continue;
            }

            let Some(field_value) = value.get_mut(spec.name()) else {
                continue;
            };

            match field_value {
                Value::Null => {}
                Value::String(stored) => match stored.strip_prefix(FIELD_MARKER) {
                    Some(ciphertext) => {
                        tracing::debug!(field = spec.name(), repository, "Decrypting field");
                        let plaintext = self.cipher.decrypt_string(ciphertext, secret).map_err(|e| {
                            StoreError::decryption(format!("field {} of {repository}", spec.name()), e)
                        })?;
                        *field_value = Value::String(plaintext);
                    }
                    None => {
                        tracing::warn!(
                            field = spec.name(),
                            repository,
                            "Secret field is not encrypted (missing marker), value left as is"
                        );
                    }
                },
                _ => {
                    tracing::error!(
                        field = spec.name(),
                        repository,
                        "Field declared as text holds a non-string value, value left untouched"
                    );
                }
            }
        }

        Ok(())
    }

    fn encrypt_object(
        &self,
        value: &Value,
        schema: &Schema,
        repository: &str,
    ) -> StoreResult<Option<String>> {
        let Some(secret_name) = schema.object_secret() else {
            return Ok(None);
        };

        let Some(secret) = self.secrets.resolve(secret_name) else {
            tracing::warn!(
                secret = secret_name,
                repository,
                "Unable to find secret, record will not be encrypted"
            );
            return Ok(None);
        };

        tracing::debug!(secret = secret_name, repository, "Encrypting record");
        let serialized =
            serde_yml::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let ciphertext = self
            .cipher
            .encrypt_string(&serialized, secret)
            .map_err(|e| StoreError::encryption(format!("record of {repository}"), e))?;

        Ok(Some(format!("{OBJECT_MARKER}{ciphertext}")))
    }

    fn decrypt_object(
        &self,
        stored: &str,
        schema: &Schema,
        repository: &str,
        path: &Path,
    ) -> StoreResult<Value> {
        let context = format!("record of {repository}");
        let ciphertext = stored.strip_prefix(OBJECT_MARKER).ok_or_else(|| {
            StoreError::decryption(context.as_str(), "missing object marker")
        })?;
        let secret_name = schema.object_secret().ok_or_else(|| {
            StoreError::decryption(context.as_str(), "record type has no object secret")
        })?;
        let secret = self.secrets.resolve(secret_name).ok_or_else(|| {
            StoreError::decryption(
                context.as_str(),
                format!("unable to find secret \"{secret_name}\""),
            )
        })?;

        let plaintext = self
            .cipher
            .decrypt_string(ciphertext, secret)
            .map_err(|e| StoreError::decryption(context.as_str(), e))?;

        serde_yml::from_str(&plaintext).map_err(|source| StoreError::Deserialization {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Credentials {
        user: String,
        password: Option<String>,
        attempts: u32,
    }

    impl Record for Credentials {
        const SCHEMA: Schema = Schema::new(&[
            FieldSpec::text("user"),
            FieldSpec::text("password").secret("field"),
            FieldSpec::primitive("attempts"),
        ]);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sealed {
        note: String,
    }

    impl Record for Sealed {
        const SCHEMA: Schema = Schema::new(&[FieldSpec::text("note")]).encrypted_with("object");
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Misdeclared {
        pin: u32,
    }

    impl Record for Misdeclared {
        const SCHEMA: Schema = Schema::new(&[FieldSpec::primitive("pin").secret("field")]);
    }

    fn secrets() -> SecretStore {
        SecretStore::new()
            .with_secret("field", "field-secret")
            .with_secret("object", "object-secret")
    }

    fn credentials() -> Credentials {
        Credentials {
            user: "alice".to_string(),
            password: Some("hunter2".to_string()),
            attempts: 3,
        }
    }

    #[test]
    fn field_encryption_roundtrip() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let codec = RecordCodec::new(&cipher, &secrets);

        let payload = codec.encode(&credentials()).unwrap();
        let Payload::Typed(value) = &payload else {
            panic!("expected typed payload");
        };
        let stored = value.get("password").and_then(Value::as_str).unwrap();
        assert!(stored.starts_with(FIELD_MARKER));
        assert!(!stored.contains("hunter2"));
        assert_eq!(value.get("user").and_then(Value::as_str), Some("alice"));

        let decoded: Credentials = codec.decode(payload, Path::new("x.yaml")).unwrap();
        assert_eq!(decoded, credentials());
    }

    #[test]
    fn null_secret_field_is_skipped() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let codec = RecordCodec::new(&cipher, &secrets);

        let mut record = credentials();
        record.password = None;
        let payload = codec.encode(&record).unwrap();
        let decoded: Credentials = codec.decode(payload, Path::new("x.yaml")).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn missing_field_secret_fails_encode() {
        let cipher = Cipher::default();
        let secrets = SecretStore::new();
        let codec = RecordCodec::new(&cipher, &secrets);

        let result = codec.encode(&credentials());
        assert!(matches!(result, Err(StoreError::Encryption { .. })));
    }

    #[test]
    fn object_encryption_roundtrip() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let codec = RecordCodec::new(&cipher, &secrets);
        let record = Sealed {
            note: "top secret note".to_string(),
        };

        let payload = codec.encode(&record).unwrap();
        let Payload::Encrypted(ciphertext) = &payload else {
            panic!("expected encrypted payload");
        };
        assert!(ciphertext.starts_with(OBJECT_MARKER));
        assert!(!ciphertext.contains("top secret note"));

        let decoded: Sealed = codec.decode(payload, Path::new("x.yaml")).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn missing_object_secret_stores_cleartext() {
        let cipher = Cipher::default();
        let secrets = SecretStore::new();
        let codec = RecordCodec::new(&cipher, &secrets);

        let payload = codec
            .encode(&Sealed {
                note: "visible".to_string(),
            })
            .unwrap();
        assert!(matches!(payload, Payload::Typed(_)));
    }

    #[test]
    fn wrong_object_secret_fails_decode() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let payload = RecordCodec::new(&cipher, &secrets)
            .encode(&Sealed {
                note: "n".to_string(),
            })
            .unwrap();

        let other = SecretStore::new().with_secret("object", "not-the-secret");
        let result = RecordCodec::new(&cipher, &other).decode::<Sealed>(payload, Path::new("x.yaml"));
        assert!(matches!(result, Err(StoreError::Decryption { .. })));
    }

    #[test]
    fn non_text_secret_field_is_left_untouched() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let codec = RecordCodec::new(&cipher, &secrets);

        let payload = codec.encode(&Misdeclared { pin: 1234 }).unwrap();
        let Payload::Typed(value) = &payload else {
            panic!("expected typed payload");
        };
        assert_eq!(value.get("pin").and_then(Value::as_u64), Some(1234));

        let decoded: Misdeclared = codec.decode(payload, Path::new("x.yaml")).unwrap();
        assert_eq!(decoded.pin, 1234);
    }

    #[test]
    fn unmarked_secret_field_is_read_as_is() {
        let cipher = Cipher::default();
        let secrets = secrets();
        let codec = RecordCodec::new(&cipher, &secrets);

        let value = clone::detach(&credentials()).unwrap();
        let decoded: Credentials = codec
            .decode(Payload::Typed(value), Path::new("x.yaml"))
            .unwrap();
        assert_eq!(decoded.password.as_deref(), Some("hunter2"));
    }
}
