//! Macro for implementing Display and FromStr for status enums
//!
//! Wire and storage representations of statuses are SCREAMING_SNAKE_CASE
//! strings. Parsing is case-insensitive so partner payloads that send
//! `in_transit` or `In_Transit` still resolve.
//!
//! # Example
//!
//! ```rust
//! use cohortsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Leg {
//!     Outbound,
//!     Return,
//! }
//!
//! impl_domain_status_conversions!(Leg {
//!     Outbound => "OUTBOUND",
//!     Return => "RETURN",
//! });
//!
//! assert_eq!("return".parse::<Leg>().unwrap(), Leg::Return);
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: writes the canonical upper-case string
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// Unknown strings are an error; callers decide whether that fails the unit
/// of work.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical string form.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
