pub mod binary;
pub mod fingerprint;

pub use binary::*;
pub use fingerprint::*;
