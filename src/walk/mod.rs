pub mod catalog;
pub mod ignore;

pub use catalog::{catalog_dir, Catalog, Entry};
pub use ignore::{IgnoreFrame, IgnoreStack};
