//! Pending email-verification record.
//!
//! One record per user at most, replaced whenever a new verification is
//! requested and deleted when the key is redeemed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerification {
    pub user_id: IdentityKey,
    /// The address that will be applied when the key is redeemed.
    pub email: String,
    pub key: String,
    /// Set on signup verifications: redeeming also enables the account.
    pub enable_on_success: bool,
    pub created_at: DateTime<Utc>,
}
