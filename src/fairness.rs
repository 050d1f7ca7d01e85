//! Commit-reveal scheme for provably fair scenario selection.
//!
//! The commitment is published before any price data is streamed; the
//! (scenario id, salt) pair is withheld until settlement, after which any
//! client can recompute the hash and verify the match was not steered.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::ScenarioId;

/// Generate a cryptographically random 32-byte salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 over `scenarioId:salt`, hex-encoded.
pub fn commit_hash(scenario_id: &ScenarioId, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scenario_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute and compare a revealed (scenario id, salt) pair against the
/// stored commitment.
pub fn verify_commit(scenario_id: &ScenarioId, salt: &str, expected_hash: &str) -> bool {
    commit_hash(scenario_id, salt) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> ScenarioId {
        ScenarioId::new("scn-123".to_string())
    }

    #[test]
    fn test_commit_verify_round_trip() {
        let salt = generate_salt();
        let hash = commit_hash(&scenario(), &salt);
        assert!(verify_commit(&scenario(), &salt, &hash));
    }

    #[test]
    fn test_tampered_inputs_fail_verification() {
        let salt = generate_salt();
        let hash = commit_hash(&scenario(), &salt);

        assert!(!verify_commit(
            &ScenarioId::new("scn-124".to_string()),
            &salt,
            &hash
        ));
        assert!(!verify_commit(&scenario(), "deadbeef", &hash));
        assert!(!verify_commit(&scenario(), &salt, "0000"));
    }

    #[test]
    fn test_commit_is_deterministic() {
        let hash1 = commit_hash(&scenario(), "abc");
        let hash2 = commit_hash(&scenario(), "abc");
        assert_eq!(hash1, hash2);
        // 32 bytes hex-encoded.
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_salt_length_and_uniqueness() {
        let s1 = generate_salt();
        let s2 = generate_salt();
        assert_eq!(s1.len(), 64);
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_known_vector() {
        // sha256("a:b")
        let hash = commit_hash(&ScenarioId::new("a".to_string()), "b");
        assert_eq!(
            hash,
            "6783a31eabf68ccc0660f935c0826282bdd2241f3a80a9f2d10d59aea9ebb5d8"
        );
    }
}
