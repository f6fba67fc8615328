/// Configuration system: single-source schemas with embedded defaults, TOML loading
mod macros;
mod schemas;
mod utils;

pub use schemas::{
    AggregatorConfig, CacheConfig, Config, HealthConfig, ProvidersConfig, StreamConfig,
};
pub use utils::{
    apply_env_overrides, get_config_clone, load_config, load_config_from_path, read_config_file,
    CONFIG_FILE_PATH,
};
