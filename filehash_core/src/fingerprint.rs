use anyhow::Context;
use futures::StreamExt;
use sha2::Digest;

use crate::encoding::{StreamDecoder, TextEncoding};
use crate::options::{Algorithm, FingerprintMode};
use crate::store::AssetStore;

enum DigestState {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => DigestState::Md5(md5::Md5::new()),
            Algorithm::Sha1 => DigestState::Sha1(sha1::Sha1::new()),
            Algorithm::Sha224 => DigestState::Sha224(sha2::Sha224::new()),
            Algorithm::Sha256 => DigestState::Sha256(sha2::Sha256::new()),
            Algorithm::Sha384 => DigestState::Sha384(sha2::Sha384::new()),
            Algorithm::Sha512 => DigestState::Sha512(sha2::Sha512::new()),
            Algorithm::Blake3 => DigestState::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Md5(h) => h.update(data),
            DigestState::Sha1(h) => h.update(data),
            DigestState::Sha224(h) => h.update(data),
            DigestState::Sha256(h) => h.update(data),
            DigestState::Sha384(h) => h.update(data),
            DigestState::Sha512(h) => h.update(data),
            DigestState::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            DigestState::Md5(h) => hex::encode(h.finalize()),
            DigestState::Sha1(h) => hex::encode(h.finalize()),
            DigestState::Sha224(h) => hex::encode(h.finalize()),
            DigestState::Sha256(h) => hex::encode(h.finalize()),
            DigestState::Sha384(h) => hex::encode(h.finalize()),
            DigestState::Sha512(h) => hex::encode(h.finalize()),
            DigestState::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Incremental content hasher: optional text decoding, trailing salt and
/// hex truncation.
pub struct ContentHasher {
    state: DigestState,
    decoder: Option<StreamDecoder>,
    salt: Option<Vec<u8>>,
    hashlen: usize,
}

impl ContentHasher {
    pub fn new(
        algorithm: Algorithm,
        hashlen: usize,
        decoder: Option<StreamDecoder>,
        salt: Option<Vec<u8>>,
    ) -> Self {
        Self {
            state: DigestState::new(algorithm),
            decoder,
            salt,
            hashlen,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        match self.decoder.as_mut() {
            Some(decoder) => {
                let text = decoder.decode(chunk);
                self.state.update(text.as_bytes());
            }
            None => self.state.update(chunk),
        }
    }

    /// Returns the hex digest truncated to `hashlen` characters.
    pub fn finish(mut self) -> String {
        if let Some(decoder) = self.decoder.take() {
            let tail = decoder.finish();
            self.state.update(tail.as_bytes());
        }
        if let Some(salt) = self.salt.take() {
            self.state.update(&salt);
        }
        let mut digest = self.state.finalize_hex();
        digest.truncate(self.hashlen);
        digest
    }
}

/// Computes fingerprints for files in an [`AssetStore`].
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    mode: FingerprintMode,
}

impl Fingerprinter {
    pub fn new(mode: FingerprintMode) -> Self {
        Self { mode }
    }

    pub fn is_etag(&self) -> bool {
        matches!(self.mode, FingerprintMode::Etag(_))
    }

    pub async fn fingerprint(&self, store: &dyn AssetStore, path: &str) -> anyhow::Result<String> {
        let fingerprint = match &self.mode {
            FingerprintMode::Etag(template) => {
                let stat = store
                    .stat(path)
                    .await
                    .with_context(|| format!("stats for {path:?} failed"))?;
                template.render(&stat.to_vars())
            }
            FingerprintMode::Hash {
                algorithm,
                hashlen,
                encoding,
                salt,
            } => {
                let mut hasher = ContentHasher::new(
                    *algorithm,
                    *hashlen,
                    encoding.map(TextEncoding::decoder),
                    salt.clone(),
                );
                let mut stream = store
                    .open_read_stream(path)
                    .await
                    .with_context(|| format!("failed to open {path:?}"))?;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.with_context(|| format!("failed to read {path:?}"))?;
                    hasher.update(&chunk);
                }
                hasher.finish()
            }
        };
        tracing::debug!(
            "{} for {}: {}",
            if self.is_etag() { "Etag" } else { "Hash" },
            path,
            fingerprint
        );
        Ok(fingerprint)
    }
}
