/// Application name
pub const APP_NAME: &str = "Profitboard";

/// Default marketplace when a submission does not name one
pub const DEFAULT_MARKETPLACE: &str = "amazon_us";

/// Default reporting period when a submission does not name one
pub const DEFAULT_REPORTING_PERIOD: &str = "monthly";

/// Default ISO 4217 currency code
pub const DEFAULT_CURRENCY: &str = "USD";

/// Highest accepted average star rating
pub const MAX_AVERAGE_RATING: f64 = 5.0;

/// Maximum proof image size in bytes (10 MiB)
pub const MAX_PROOF_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Header carrying the break-glass admin passcode
pub const ADMIN_PASSCODE_HEADER: &str = "x-admin-passcode";

/// Largest accepted value for count fields (units, clicks, sessions, ...)
pub const MAX_COUNT: i64 = 1_000_000_000_000;
