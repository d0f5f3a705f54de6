//! Type definitions

pub mod feedback;
pub mod import;
pub mod messages;
pub mod profile;
pub mod report;

pub use feedback::*;
pub use import::*;
pub use messages::*;
pub use profile::*;
pub use report::*;
