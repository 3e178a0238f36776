//! Decryption of objects written by the S3 encryption client.
//!
//! Only the v2 envelope format with a KMS-wrapped data key is supported:
//!
//! | Metadata key | Value |
//! |--------------|-------|
//! | `x-amz-key-v2` | base64 data key encrypted by KMS |
//! | `x-amz-iv` | base64 12-byte nonce |
//! | `x-amz-cek-alg` | `AES/GCM/NoPadding` |
//! | `x-amz-wrap-alg` | `kms+context` |
//! | `x-amz-matdesc` | JSON encryption context |
//!
//! The data key is unwrapped with any KMS key the caller can use, and the
//! whole body is decrypted in memory since GCM authenticates the full
//! ciphertext.

use std::collections::HashMap;

use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use aws_sdk_kms::primitives::Blob;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use imgstore_core::{StorageError, StorageResult};

/// Metadata key holding the plaintext length.
pub(crate) const UNENCRYPTED_CONTENT_LENGTH: &str = "x-amz-unencrypted-content-length";

const KEY_V2: &str = "x-amz-key-v2";
const KEY_V1: &str = "x-amz-key";
const IV: &str = "x-amz-iv";
const CEK_ALG: &str = "x-amz-cek-alg";
const WRAP_ALG: &str = "x-amz-wrap-alg";
const MATDESC: &str = "x-amz-matdesc";
const TAG_LEN: &str = "x-amz-tag-len";

const AES_GCM: &str = "AES/GCM/NoPadding";
const KMS_CONTEXT: &str = "kms+context";
const GCM_NONCE_LEN: usize = 12;

/// The parsed encryption envelope of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope {
    /// Data key as encrypted by KMS.
    pub encrypted_key: Vec<u8>,
    /// GCM nonce.
    pub iv: Vec<u8>,
    /// KMS encryption context.
    pub context: HashMap<String, String>,
}

impl Envelope {
    /// Parse the envelope from user metadata.
    ///
    /// Returns `Ok(None)` for unencrypted objects.
    pub(crate) fn from_metadata(
        metadata: Option<&HashMap<String, String>>,
    ) -> StorageResult<Option<Self>> {
        let Some(metadata) = metadata else {
            return Ok(None);
        };

        let Some(key) = metadata.get(KEY_V2) else {
            if metadata.contains_key(KEY_V1) {
                return Err(decryption_error(
                    "objects encrypted with the v1 envelope format are not supported",
                ));
            }
            return Ok(None);
        };

        let cek_alg = metadata.get(CEK_ALG).map(String::as_str).unwrap_or_default();
        if cek_alg != AES_GCM {
            return Err(decryption_error(format!(
                "unsupported content encryption algorithm {cek_alg:?}"
            )));
        }

        let wrap_alg = metadata.get(WRAP_ALG).map(String::as_str).unwrap_or_default();
        if wrap_alg != KMS_CONTEXT {
            return Err(decryption_error(format!(
                "unsupported key wrapping algorithm {wrap_alg:?}"
            )));
        }

        if let Some(tag_len) = metadata.get(TAG_LEN) {
            if tag_len != "128" {
                return Err(decryption_error(format!("unsupported tag length {tag_len}")));
            }
        }

        let encrypted_key = BASE64_STANDARD
            .decode(key)
            .map_err(|e| decryption_error(format!("invalid {KEY_V2}: {e}")))?;

        let iv = metadata
            .get(IV)
            .ok_or_else(|| decryption_error(format!("missing {IV}")))
            .and_then(|iv| {
                BASE64_STANDARD
                    .decode(iv)
                    .map_err(|e| decryption_error(format!("invalid {IV}: {e}")))
            })?;
        if iv.len() != GCM_NONCE_LEN {
            return Err(decryption_error(format!(
                "invalid {IV} length {}",
                iv.len()
            )));
        }

        let context = match metadata.get(MATDESC) {
            Some(matdesc) if !matdesc.is_empty() => serde_json::from_str(matdesc)
                .map_err(|e| decryption_error(format!("invalid {MATDESC}: {e}")))?,
            _ => HashMap::new(),
        };

        Ok(Some(Self {
            encrypted_key,
            iv,
            context,
        }))
    }

    /// Unwrap the data key through KMS and decrypt `ciphertext`.
    pub(crate) async fn decrypt(
        &self,
        kms: &aws_sdk_kms::Client,
        ciphertext: &[u8],
    ) -> StorageResult<Bytes> {
        let output = kms
            .decrypt()
            .ciphertext_blob(Blob::new(self.encrypted_key.clone()))
            .set_encryption_context(Some(self.context.clone()))
            .send()
            .await
            .map_err(|e| {
                decryption_error(format!(
                    "can't unwrap data key: {}",
                    aws_sdk_kms::error::DisplayErrorContext(&e)
                ))
            })?;

        let key = output
            .plaintext()
            .ok_or_else(|| decryption_error("KMS returned no plaintext data key"))?;

        decrypt_content(key.as_ref(), &self.iv, ciphertext)
    }
}

/// AES-256-GCM decrypt `ciphertext` (with its trailing tag).
pub(crate) fn decrypt_content(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> StorageResult<Bytes> {
    if iv.len() != GCM_NONCE_LEN {
        return Err(decryption_error(format!("invalid nonce length {}", iv.len())));
    }
    let cipher = UnboundKey::new(&AES_256_GCM, key)
        .map(LessSafeKey::new)
        .map_err(|_| decryption_error(format!("invalid data key length {}", key.len())))?;
    let nonce = Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| decryption_error(format!("invalid nonce length {}", iv.len())))?;

    let mut in_out = ciphertext.to_vec();
    let len = cipher
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| decryption_error("content authentication failed"))?
        .len();
    in_out.truncate(len);
    Ok(Bytes::from(in_out))
}

/// Parse the plaintext length recorded by the encryption client.
pub(crate) fn unencrypted_content_length(
    metadata: Option<&HashMap<String, String>>,
) -> StorageResult<Option<u64>> {
    let Some(value) = metadata.and_then(|m| m.get(UNENCRYPTED_CONTENT_LENGTH)) else {
        return Ok(None);
    };
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e| {
        StorageError::backend(
            "S3",
            format!("invalid {UNENCRYPTED_CONTENT_LENGTH} value {value:?}: {e}"),
        )
    })
}

fn decryption_error(message: impl Into<String>) -> StorageError {
    StorageError::Decryption(message.into())
}
