pub mod catalog;

pub use catalog::{Catalog, load_catalog, load_raw, merge, save_catalog};
