//! Structural verification of index proofs
//!
//! Proof construction and root hash recomputation belong to the hashing
//! layer; this module only classifies whether a received proof is well formed.

pub mod map;

pub use map::{CheckedMapProof, MapProofEntry, MapProofStatus, ProofPath, UncheckedMapProof};
