//! Logging macros
//!
//! Forward to `defmt` when the `defmt` feature is enabled and compile to
//! nothing otherwise, so the crate stays usable in host tests.

#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => {{
        defmt::trace!($($arg)*);
    }};
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => {{
        defmt::debug!($($arg)*);
    }};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => {{
        defmt::warn!($($arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}
