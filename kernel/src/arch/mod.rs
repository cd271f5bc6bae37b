//! Architecture support.
//!
//! Filament targets x86-64 only; the module exists so the instruction-level
//! leaves stay in one place.

pub mod x86_64;

pub use self::x86_64::Selectors;
