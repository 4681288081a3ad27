pub mod clock;
pub mod http_helpers;
pub mod log_throttle;
pub mod logger;
