#![forbid(unsafe_code)]

pub mod directives;
pub mod error;
pub mod model;
pub mod narration;
pub mod region;
pub mod time;

pub use error::Error;
pub use time::Clock;
