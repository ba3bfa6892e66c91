//! Password acceptability policy.
//!
//! Hashing lives in the storage layer; this is only the pluggable predicate
//! models consult before accepting a new password.

pub trait PasswordPolicy: Send + Sync {
    fn acceptable(&self, candidate: &str) -> bool;
}

/// Default policy: a minimum character count, nothing else.
#[derive(Debug, Clone, Copy)]
pub struct MinLengthPolicy {
    pub min_length: usize,
}

impl Default for MinLengthPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy for MinLengthPolicy {
    fn acceptable(&self, candidate: &str) -> bool {
        candidate.chars().count() >= self.min_length
    }
}
