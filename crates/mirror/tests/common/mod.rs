pub mod fakes;
pub mod fixtures;

#[allow(unused_imports)]
pub use fakes::{Behavior, FakeUpstream, RELEASES_BASE, archive_bytes, manifest_of};
#[allow(unused_imports)]
pub use fixtures::{
    MIRROR_BASE, abbey, copier_config, darwin_arm64, eventually, linux_amd64, mirror_service,
    mirror_storage, seed_mirror,
};
