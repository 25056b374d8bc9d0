pub mod asset;
pub mod maintenance;
pub mod media;
