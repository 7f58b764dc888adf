mod serialize;
mod types;

pub use serialize::sanitize;
pub use types::Command;
