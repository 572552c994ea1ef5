//! Default values applied when a tenant document omits optional fields.
//!
//! # Design
//! - Keep defaults in one place so the loader and docs agree.

/// Schedule used when a tenant does not configure one.
pub const DEFAULT_SCHEDULE: &str = "@daily";
/// Archive retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Standard SSH port.
pub const DEFAULT_SFTP_PORT: u16 = 22;
/// Configuration file looked up when no path is supplied.
pub const DEFAULT_CONFIG_PATH: &str = "configs.json";

pub(crate) const fn retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

pub(crate) const fn sftp_port() -> u16 {
    DEFAULT_SFTP_PORT
}
