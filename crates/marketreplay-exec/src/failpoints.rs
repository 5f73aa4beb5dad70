//! Chaos/failpoint hooks (feature: `failpoints`).
//!
//! Keep this extremely light: the macro expands to nothing unless the
//! feature is enabled. When enabled, it can panic on named points in the
//! dispatch loop for crash-recovery testing.

#[cfg(feature = "failpoints")]
#[macro_export]
macro_rules! fail_point {
    ($name:expr) => {{
        if $name.starts_with("panic_") {
            panic!("failpoint triggered: {}", $name);
        }
    }};
}

#[cfg(not(feature = "failpoints"))]
#[macro_export]
macro_rules! fail_point {
    ($name:expr) => {
        let _ = $name;
    };
}
