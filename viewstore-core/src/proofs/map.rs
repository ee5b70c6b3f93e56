/*
    map.rs - Map proof status and structural checks

    A map proof consists of:
    - proof nodes: (path, hash) pairs for the subtrees not covered by the
      requested keys, where a path is a bit prefix of a 256-bit key
    - entries: requested keys found in the map, with their values
    - missing keys: requested keys absent from the map

    `UncheckedMapProof::check` rejects malformed proofs before any hashing
    happens. A rejected proof says nothing about whether a key is present.
*/

use crate::storage::errors::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Length of a full key and of every proof hash, in bytes
pub const HASH_SIZE: usize = 32;

/// Number of bits in a full key path
pub const KEY_BITS: u16 = (HASH_SIZE * 8) as u16;

/// Result of a structural proof check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapProofStatus {
    Correct,
    NonTerminalNode,
    InvalidOrder,
    DuplicatePath,
    EmbeddedPath,
    InvalidHashSize,
}

impl MapProofStatus {
    pub fn description(&self) -> &'static str {
        match self {
            MapProofStatus::Correct => "Proof has a valid structure",
            MapProofStatus::NonTerminalNode => {
                "Proof entry in a singleton proof is of branch type (must be a leaf)"
            }
            MapProofStatus::InvalidOrder => "Proof entries are placed in the wrong order",
            MapProofStatus::DuplicatePath => "There are entries with duplicate keys",
            MapProofStatus::EmbeddedPath => "One key in the proof is a prefix of another key",
            MapProofStatus::InvalidHashSize => "Invalid size of proof hash, must be 32 bytes",
        }
    }

    pub fn is_correct(&self) -> bool {
        *self == MapProofStatus::Correct
    }
}

impl fmt::Display for MapProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Bit prefix of a 256-bit key
///
/// Bits are numbered from the least significant bit of the first byte.
/// Paths order bit by bit; a path sorts before every longer path it is a
/// prefix of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofPath {
    key: [u8; HASH_SIZE],
    len: u16,
}

impl ProofPath {
    /// Path of a full key (a leaf)
    pub fn leaf(key: [u8; HASH_SIZE]) -> Self {
        ProofPath { key, len: KEY_BITS }
    }

    /// The first `len` bits of `key`
    ///
    /// Bits past `len` are cleared so equal prefixes compare equal.
    pub fn prefix(key: [u8; HASH_SIZE], len: u16) -> StorageResult<Self> {
        if len > KEY_BITS {
            return Err(StorageError::InvalidArgument(format!(
                "path length {} exceeds {} bits",
                len, KEY_BITS
            )));
        }
        let mut key = key;
        for bit in len..KEY_BITS {
            key[usize::from(bit / 8)] &= !(1 << (bit % 8));
        }
        Ok(ProofPath { key, len })
    }

    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the path addresses a single key
    pub fn is_terminal(&self) -> bool {
        self.len == KEY_BITS
    }

    pub fn bit(&self, index: u16) -> bool {
        (self.key[usize::from(index / 8)] >> (index % 8)) & 1 == 1
    }

    /// Number of leading bits shared with `other`
    pub fn common_prefix_len(&self, other: &ProofPath) -> u16 {
        let limit = self.len.min(other.len);
        (0..limit)
            .find(|&i| self.bit(i) != other.bit(i))
            .unwrap_or(limit)
    }

    /// Whether `self` is a proper prefix of `other`
    pub fn is_prefix_of(&self, other: &ProofPath) -> bool {
        self.len < other.len && self.common_prefix_len(other) == self.len
    }
}

impl Ord for ProofPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let common = self.common_prefix_len(other);
        if common < self.len && common < other.len {
            self.bit(common).cmp(&other.bit(common))
        } else {
            self.len.cmp(&other.len)
        }
    }
}

impl PartialOrd for ProofPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProofPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", hex::encode(self.key), self.len)
    }
}

/// Hash of a subtree the proof does not expand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapProofEntry {
    pub path: ProofPath,
    pub hash: Vec<u8>,
}

impl MapProofEntry {
    pub fn new(path: ProofPath, hash: impl Into<Vec<u8>>) -> Self {
        MapProofEntry {
            path,
            hash: hash.into(),
        }
    }
}

/// A map proof as received, not yet checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncheckedMapProof {
    pub proof: Vec<MapProofEntry>,
    pub entries: Vec<([u8; HASH_SIZE], Vec<u8>)>,
    pub missing_keys: Vec<[u8; HASH_SIZE]>,
}

impl UncheckedMapProof {
    pub fn new(
        proof: Vec<MapProofEntry>,
        entries: Vec<([u8; HASH_SIZE], Vec<u8>)>,
        missing_keys: Vec<[u8; HASH_SIZE]>,
    ) -> Self {
        UncheckedMapProof {
            proof,
            entries,
            missing_keys,
        }
    }

    /// Check the structure of the proof
    pub fn check(self) -> CheckedMapProof {
        let status = self.structure_status();
        if status.is_correct() {
            CheckedMapProof {
                status,
                entries: self.entries,
                missing_keys: self.missing_keys,
            }
        } else {
            CheckedMapProof::invalid(status)
        }
    }

    fn structure_status(&self) -> MapProofStatus {
        if self.proof.iter().any(|node| node.hash.len() != HASH_SIZE) {
            return MapProofStatus::InvalidHashSize;
        }

        for pair in self.proof.windows(2) {
            let (prev, next) = (&pair[0].path, &pair[1].path);
            if prev == next {
                return MapProofStatus::DuplicatePath;
            }
            if prev.is_prefix_of(next) || next.is_prefix_of(prev) {
                return MapProofStatus::EmbeddedPath;
            }
            if prev > next {
                return MapProofStatus::InvalidOrder;
            }
        }

        let mut requested: Vec<&[u8; HASH_SIZE]> = self
            .entries
            .iter()
            .map(|(key, _)| key)
            .chain(self.missing_keys.iter())
            .collect();
        requested.sort_unstable();
        if requested.windows(2).any(|pair| pair[0] == pair[1]) {
            return MapProofStatus::DuplicatePath;
        }

        // A lone node with no entries stands for the whole tree, which then
        // holds exactly one key.
        if let [only] = self.proof.as_slice() {
            if self.entries.is_empty() && !only.path.is_terminal() {
                return MapProofStatus::NonTerminalNode;
            }
        }

        MapProofStatus::Correct
    }
}

/// A map proof after the structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedMapProof {
    status: MapProofStatus,
    entries: Vec<([u8; HASH_SIZE], Vec<u8>)>,
    missing_keys: Vec<[u8; HASH_SIZE]>,
}

impl CheckedMapProof {
    fn invalid(status: MapProofStatus) -> Self {
        CheckedMapProof {
            status,
            entries: Vec::new(),
            missing_keys: Vec::new(),
        }
    }

    pub fn status(&self) -> MapProofStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_correct()
    }

    /// Entries proven present; `None` if the proof was rejected
    pub fn entries(&self) -> Option<&[([u8; HASH_SIZE], Vec<u8>)]> {
        self.is_valid().then_some(self.entries.as_slice())
    }

    /// Keys proven absent; `None` if the proof was rejected
    pub fn missing_keys(&self) -> Option<&[[u8; HASH_SIZE]]> {
        self.is_valid().then_some(self.missing_keys.as_slice())
    }

    /// Value of `key` if it was proven present
    ///
    /// A rejected proof yields `None` for every key, which callers must not
    /// confuse with absence: check `is_valid` first.
    pub fn get(&self, key: &[u8; HASH_SIZE]) -> Option<&[u8]> {
        self.entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }
}
