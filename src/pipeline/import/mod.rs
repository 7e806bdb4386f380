pub mod format;
pub mod hash;
pub mod staging;

pub use format::*;
pub use hash::*;
pub use staging::*;
