pub mod code;
pub mod location;

pub use code::*;
pub use location::*;
