//! CLI command implementations

pub mod release;
pub mod requirements;

pub use release::execute as release;
pub use requirements::execute as requirements;
