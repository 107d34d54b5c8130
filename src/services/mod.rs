pub mod expiry;
pub mod notifier;
pub mod reconciliation;
pub mod sessions;
pub mod video;
pub mod withdrawals;
