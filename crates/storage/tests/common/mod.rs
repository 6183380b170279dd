pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{abbey, manifest_for, mirror_storage};
