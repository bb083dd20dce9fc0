//! Price-structure pattern detectors
//!
//! # Modules
//!
//! - **pivots**: pivot highs/lows as ordered `(position, price)` records and
//!   shoulder-head-shoulder triples over them.
//! - **head_shoulders**: head-and-shoulders / inverse head-and-shoulders
//!   confirmation, neckline projection and overlap resolution.

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod head_shoulders;
pub mod pivots;

pub use head_shoulders::*;
pub use pivots::*;
