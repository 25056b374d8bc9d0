pub mod business_asset;
pub mod business_primary;
