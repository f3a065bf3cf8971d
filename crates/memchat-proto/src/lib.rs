pub mod error;
pub mod frames;
pub mod types;

pub use error::*;
pub use frames::*;
pub use types::*;
