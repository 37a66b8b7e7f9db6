pub mod error;
pub mod format;
pub mod key;

pub use error::*;
pub use format::*;
pub use key::*;
