//! Vector index registry: one flat inner-product index per embedding space,
//! plus the shared id-to-asset map.

pub mod asset_map;
pub mod builder;
pub mod flat;

pub use asset_map::IdAssetMap;
pub use builder::{BuiltCorpus, build_from_features};
pub use flat::FlatIpIndex;
