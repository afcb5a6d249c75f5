//! User-facing output macros.
//!
//! These write short, prefixed one-liners to stderr so that messages meant for
//! the person running the test suite stay visible even when no tracing
//! subscriber is installed.

#[macro_export]
macro_rules! mts_error {
    ($($arg:tt)*) => {
        eprintln!("MongoTestServer: {}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! mts_warning {
    ($($arg:tt)*) => {
        eprintln!("MongoTestServer: ⚠ {}", format!($($arg)*));
    };
}
