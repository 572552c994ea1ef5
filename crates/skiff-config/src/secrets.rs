//! Credential resolution and AES-CFB decryption.
//!
//! # Design
//! - The symmetric key is read from `SKIFF_CREDENTIAL_KEY`; there is no built-in key.
//! - Ciphertext layout: 16-byte IV followed by AES output in 128-bit CFB mode,
//!   encoded with the padded base64 URL alphabet.
//! - Environment access goes through a lookup closure so callers and tests can
//!   substitute their own source.

use std::fmt::{self, Debug, Formatter};

use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use aes::{Aes128, Aes192, Aes256};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::Rng;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::model::RemoteEndpoint;

/// Environment variable holding the credential key.
pub const CREDENTIAL_KEY_ENV: &str = "SKIFF_CREDENTIAL_KEY";

const BLOCK_LEN: usize = 16;

/// Where an SFTP password comes from.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    /// Encrypted with the credential key.
    Encrypted(String),
    /// Read verbatim from the named environment variable.
    Env(String),
}

impl Debug for PasswordSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypted(_) => formatter.write_str("Encrypted(..)"),
            Self::Env(name) => formatter.debug_tuple("Env").field(name).finish(),
        }
    }
}

impl PasswordSource {
    /// Resolve the plain-text password using `lookup` for environment access.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced variable is unset or the encrypted
    /// value cannot be decrypted.
    pub fn resolve_with<F>(&self, lookup: F) -> ConfigResult<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Self::Env(name) => lookup(name).ok_or_else(|| ConfigError::MissingEnv {
                name: name.clone(),
            }),
            Self::Encrypted(encoded) => {
                let key = lookup(CREDENTIAL_KEY_ENV).ok_or_else(|| ConfigError::MissingEnv {
                    name: CREDENTIAL_KEY_ENV.to_string(),
                })?;
                CredentialCipher::from_key(key.as_bytes())?.decrypt(encoded)
            }
        }
    }
}

/// Resolved login material handed to a connector.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Login name; empty for local endpoints.
    pub username: String,
    password: String,
}

impl Credentials {
    /// Build credentials from explicit values.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Resolve credentials for `endpoint` from the process environment.
    ///
    /// # Errors
    ///
    /// See [`PasswordSource::resolve_with`].
    pub fn for_endpoint(endpoint: &RemoteEndpoint) -> ConfigResult<Self> {
        Self::for_endpoint_with(endpoint, |name| std::env::var(name).ok())
    }

    /// Resolve credentials for `endpoint` using a custom lookup.
    ///
    /// # Errors
    ///
    /// See [`PasswordSource::resolve_with`].
    pub fn for_endpoint_with<F>(endpoint: &RemoteEndpoint, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match endpoint {
            RemoteEndpoint::Sftp {
                username, password, ..
            } => Ok(Self::new(username.clone(), password.resolve_with(lookup)?)),
            RemoteEndpoint::Local { .. } => Ok(Self::default()),
        }
    }

    /// Password in plain text.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Debug for Credentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// AES block cipher keyed for credential encryption.
pub enum CredentialCipher {
    /// 16-byte key.
    Aes128(Box<Aes128>),
    /// 24-byte key.
    Aes192(Box<Aes192>),
    /// 32-byte key.
    Aes256(Box<Aes256>),
}

#[derive(Clone, Copy)]
enum CfbMode {
    Encrypt,
    Decrypt,
}

impl CredentialCipher {
    /// Build a cipher from raw key bytes; the length selects the AES variant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] unless the key is 16, 24 or 32 bytes.
    pub fn from_key(key: &[u8]) -> ConfigResult<Self> {
        let invalid = |_| ConfigError::InvalidKey { length: key.len() };
        match key.len() {
            16 => Aes128::new_from_slice(key).map(|c| Self::Aes128(Box::new(c))),
            24 => Aes192::new_from_slice(key).map(|c| Self::Aes192(Box::new(c))),
            32 => Aes256::new_from_slice(key).map(|c| Self::Aes256(Box::new(c))),
            length => return Err(ConfigError::InvalidKey { length }),
        }
        .map_err(invalid)
    }

    /// Build a cipher from [`CREDENTIAL_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when the variable is unset, or
    /// [`ConfigError::InvalidKey`] for a bad key length.
    pub fn from_env() -> ConfigResult<Self> {
        let key = std::env::var(CREDENTIAL_KEY_ENV).map_err(|_| ConfigError::MissingEnv {
            name: CREDENTIAL_KEY_ENV.to_string(),
        })?;
        Self::from_key(key.as_bytes())
    }

    /// Decrypt a base64url IV-prefixed ciphertext into a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid base64, a ciphertext shorter than the IV,
    /// or plaintext that is not UTF-8.
    pub fn decrypt(&self, encoded: &str) -> ConfigResult<String> {
        let raw = URL_SAFE
            .decode(encoded.trim())
            .map_err(|source| ConfigError::Decode { source })?;
        if raw.len() < BLOCK_LEN {
            return Err(ConfigError::Decrypt {
                reason: "ciphertext shorter than initialisation vector",
            });
        }
        let (iv, body) = raw.split_at(BLOCK_LEN);
        let mut feedback = [0_u8; BLOCK_LEN];
        feedback.copy_from_slice(iv);
        let plain = self.apply_cfb(feedback, body, CfbMode::Decrypt);
        String::from_utf8(plain).map_err(|_| ConfigError::Decrypt {
            reason: "plaintext is not valid utf-8",
        })
    }

    /// Encrypt `plain` with a fresh random IV.
    #[must_use]
    pub fn encrypt(&self, plain: &str) -> String {
        let mut iv = [0_u8; BLOCK_LEN];
        rand::rng().fill(&mut iv);
        self.encrypt_with_iv(plain, iv)
    }

    /// Encrypt `plain` with a caller-supplied IV.
    #[must_use]
    pub fn encrypt_with_iv(&self, plain: &str, iv: [u8; BLOCK_LEN]) -> String {
        let mut raw = Vec::with_capacity(BLOCK_LEN + plain.len());
        raw.extend_from_slice(&iv);
        raw.extend(self.apply_cfb(iv, plain.as_bytes(), CfbMode::Encrypt));
        URL_SAFE.encode(raw)
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(cipher) => cipher.encrypt_block(block),
            Self::Aes192(cipher) => cipher.encrypt_block(block),
            Self::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    fn apply_cfb(&self, iv: [u8; BLOCK_LEN], input: &[u8], mode: CfbMode) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len());
        let mut feedback = iv;
        for chunk in input.chunks(BLOCK_LEN) {
            let mut keystream = feedback;
            self.encrypt_block(&mut keystream);
            let start = output.len();
            output.extend(chunk.iter().zip(keystream.iter()).map(|(b, k)| b ^ k));
            let cipher_bytes = match mode {
                CfbMode::Encrypt => &output[start..],
                CfbMode::Decrypt => chunk,
            };
            feedback[..cipher_bytes.len()].copy_from_slice(cipher_bytes);
        }
        output
    }
}
