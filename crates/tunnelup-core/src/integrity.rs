use sha2::{Digest, Sha256, Sha384, Sha512};

/// Digest algorithms an update descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Resolve a descriptor's algorithm identifier (case-insensitive).
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    #[must_use]
    pub fn supports(id: &str) -> bool {
        Self::from_id(id).is_some()
    }

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn hasher(self) -> DigestState {
        match self {
            Self::Sha256 => DigestState::Sha256(Sha256::new()),
            Self::Sha384 => DigestState::Sha384(Sha384::new()),
            Self::Sha512 => DigestState::Sha512(Sha512::new()),
        }
    }
}

/// Running hash over streamed artifact bytes.
#[derive(Debug, Clone)]
pub enum DigestState {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(bytes),
            Self::Sha384(hasher) => hasher.update(bytes),
            Self::Sha512(hasher) => hasher.update(bytes),
        }
    }

    /// Drop everything hashed so far.
    pub fn reset(&mut self) {
        match self {
            Self::Sha256(hasher) => Digest::reset(hasher),
            Self::Sha384(hasher) => Digest::reset(hasher),
            Self::Sha512(hasher) => Digest::reset(hasher),
        }
    }

    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(hasher) => hasher.finalize().to_vec(),
            Self::Sha384(hasher) => hasher.finalize().to_vec(),
            Self::Sha512(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// Compare a computed digest against the descriptor's hex string.
///
/// Malformed hex (odd length, non-hex characters) never matches. Equal-length
/// inputs are compared over every byte regardless of where they first differ.
#[must_use]
pub fn verify_digest(digest: &[u8], expected_hex: &str) -> bool {
    let Ok(expected) = hex::decode(expected_hex.trim()) else {
        return false;
    };
    if expected.len() != digest.len() {
        return false;
    }

    digest
        .iter()
        .zip(&expected)
        .fold(0_u8, |diff, (actual, wanted)| diff | (actual ^ wanted))
        == 0
}
