//! Provider implementations

pub mod kiro;

pub use kiro::KiroProvider;
