//! Authenticated cookie codec.
//!
//! Turns a serializable value into opaque cookie text and back. The payload
//! is JSON, optionally sealed with AES-256-GCM, and always bound to the
//! cookie name and an issue timestamp by an HMAC-SHA256 tag:
//!
//! ```text
//! cookie = base64url( timestamp | base64url(payload) | base64url(tag) )
//! tag    = HMAC-SHA256( name | timestamp | base64url(payload) )
//! ```
//!
//! The codec accepts an ordered key list: the first (newest) key signs,
//! every key is tried during verification. Prepending a fresh key rotates
//! credentials without invalidating cookies minted under the old ones.
//!
//! ## Example
//!
//! ```
//! use margin_sessions::codec::{CookieCodec, Key};
//!
//! # fn example() -> Result<(), margin_sessions::error::CodecError> {
//! let codec = CookieCodec::new(vec![Key::new(b"a-signing-secret")])?;
//!
//! let token = codec.encode("session", &"some-session-key".to_string())?;
//! let decoded: String = codec.decode("session", &token)?;
//! assert_eq!(decoded, "some-session-key");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::error::CodecError;

type HmacSha256 = Hmac<Sha256>;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// One signing (and optionally encryption) credential.
#[derive(Clone)]
pub struct Key {
	signing: Vec<u8>,
	encryption: Option<[u8; 32]>,
}

impl Key {
	/// Create a signing-only key. Any secret length is accepted; HMAC
	/// hashes longer keys down internally.
	pub fn new(secret: impl AsRef<[u8]>) -> Self {
		Self {
			signing: secret.as_ref().to_vec(),
			encryption: None,
		}
	}

	/// Add a 32-byte AES-256-GCM encryption secret to this key.
	///
	/// # Examples
	///
	/// ```
	/// use margin_sessions::codec::Key;
	///
	/// let key = Key::new(b"signing-secret").with_encryption(&[0u8; 32]).unwrap();
	/// # let _ = key;
	/// ```
	pub fn with_encryption(mut self, secret: &[u8]) -> Result<Self, CodecError> {
		let secret: [u8; 32] = secret.try_into().map_err(|_| {
			CodecError::Config(format!(
				"encryption key must be 32 bytes, got {}",
				secret.len()
			))
		})?;
		self.encryption = Some(secret);
		Ok(self)
	}

	fn sign(&self, name: &str, timestamp: i64, payload: &str) -> String {
		let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing)
			.expect("HMAC accepts keys of any length");
		mac.update(format!("{}|{}|{}", name, timestamp, payload).as_bytes());
		URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
	}

	fn verify(&self, name: &str, timestamp: i64, payload: &str, tag: &str) -> bool {
		let Ok(tag) = URL_SAFE_NO_PAD.decode(tag) else {
			return false;
		};
		let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing)
			.expect("HMAC accepts keys of any length");
		mac.update(format!("{}|{}|{}", name, timestamp, payload).as_bytes());
		mac.verify_slice(&tag).is_ok()
	}

	fn cipher(&self) -> Option<Aes256Gcm> {
		self.encryption
			.as_ref()
			.map(|secret| Aes256Gcm::new_from_slice(secret).expect("validated 32-byte key"))
	}
}

impl std::fmt::Debug for Key {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// Never print key material.
		f.debug_struct("Key")
			.field("encryption", &self.encryption.is_some())
			.finish_non_exhaustive()
	}
}

/// Authenticated (optionally encrypted) cookie codec with key rotation.
#[derive(Debug, Clone)]
pub struct CookieCodec {
	keys: Vec<Key>,
	max_age: i64,
}

impl CookieCodec {
	/// Create a codec from an ordered key list, newest first.
	pub fn new(keys: Vec<Key>) -> Result<Self, CodecError> {
		if keys.is_empty() {
			return Err(CodecError::Config("at least one key is required".into()));
		}
		Ok(Self { keys, max_age: 0 })
	}

	/// Set the maximum accepted signature age in seconds. Zero or negative
	/// disables the age check.
	pub fn with_max_age(mut self, max_age: i64) -> Self {
		self.max_age = max_age;
		self
	}

	/// Encode a value into opaque cookie text using the newest key.
	pub fn encode<T: Serialize>(&self, name: &str, value: &T) -> Result<String, CodecError> {
		self.encode_at(name, value, Utc::now().timestamp())
	}

	fn encode_at<T: Serialize>(
		&self,
		name: &str,
		value: &T,
		timestamp: i64,
	) -> Result<String, CodecError> {
		let key = &self.keys[0];
		let mut payload =
			serde_json::to_vec(value).map_err(|e| CodecError::Encoding(e.to_string()))?;

		if let Some(cipher) = key.cipher() {
			let mut nonce = [0u8; NONCE_LEN];
			OsRng.fill_bytes(&mut nonce);
			let sealed = cipher
				.encrypt(Nonce::from_slice(&nonce), payload.as_slice())
				.map_err(|_| CodecError::Encoding("payload encryption failed".into()))?;
			let mut buf = nonce.to_vec();
			buf.extend_from_slice(&sealed);
			payload = buf;
		}

		let payload = URL_SAFE_NO_PAD.encode(payload);
		let tag = key.sign(name, timestamp, &payload);
		Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}|{}", timestamp, payload, tag)))
	}

	/// Decode cookie text back into a value, trying each key in order.
	///
	/// Fails with [`CodecError::Signature`] when no key authenticates the
	/// tag (tampered, truncated, or minted under an unknown key) and with
	/// [`CodecError::Expired`] when the tag is older than the configured
	/// max age.
	pub fn decode<T: DeserializeOwned>(&self, name: &str, text: &str) -> Result<T, CodecError> {
		let raw = URL_SAFE_NO_PAD
			.decode(text)
			.map_err(|_| CodecError::Signature)?;
		let raw = String::from_utf8(raw).map_err(|_| CodecError::Signature)?;

		let mut parts = raw.splitn(3, '|');
		let (timestamp, payload, tag) = match (parts.next(), parts.next(), parts.next()) {
			(Some(ts), Some(payload), Some(tag)) => (ts, payload, tag),
			_ => return Err(CodecError::Signature),
		};
		let timestamp: i64 = timestamp.parse().map_err(|_| CodecError::Signature)?;

		let key = self
			.keys
			.iter()
			.find(|key| key.verify(name, timestamp, payload, tag))
			.ok_or(CodecError::Signature)?;

		if self.max_age > 0 && Utc::now().timestamp() - timestamp > self.max_age {
			return Err(CodecError::Expired);
		}

		let mut bytes = URL_SAFE_NO_PAD
			.decode(payload)
			.map_err(|_| CodecError::Signature)?;
		if let Some(cipher) = key.cipher() {
			if bytes.len() < NONCE_LEN {
				return Err(CodecError::Signature);
			}
			let (nonce, sealed) = bytes.split_at(NONCE_LEN);
			bytes = cipher
				.decrypt(Nonce::from_slice(nonce), sealed)
				.map_err(|_| CodecError::Signature)?;
		}

		serde_json::from_slice(&bytes).map_err(|_| CodecError::Signature)
	}
}
