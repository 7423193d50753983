mod settings;

pub use settings::{
    ApnsConfig, LogConfig, LogFormat, OtelConfig, PayloadConfig, RedisConfig, ServerConfig,
    Settings,
};
