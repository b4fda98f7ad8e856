mod asset_cache_port;
mod resource_fetcher;
mod warm_flag_port;

pub use asset_cache_port::AssetCachePort;
pub use resource_fetcher::ResourceFetcher;
pub use warm_flag_port::WarmFlagPort;
