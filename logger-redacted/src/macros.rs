// Logging macro that redacts the formatted message before emitting it
#[macro_export]
macro_rules! redacted_info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!("{}", $crate::redact(&format!($($arg)*)))
    };
}

