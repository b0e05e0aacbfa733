/// In debug builds, panics on failure like `panic!`; in release builds logs
/// via `tracing::error!` instead. Used for invariant violations the caller
/// has already converted to a disconnect rather than a crash (ring overflow
/// past the `Session`'s own guards).
#[macro_export]
macro_rules! safe_panic {
    ($($arg:tt)*) => (if cfg!(debug_assertions) { panic!($($arg)*); } else { tracing::error!($($arg)*) })
}
