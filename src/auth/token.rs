//! Verification token models: secrets, keyed hashes, purposes, and persisted records.

pub mod hash;
pub mod purpose;
pub mod record;
pub mod secret;
