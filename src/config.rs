use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,  // bytes
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    // Applied to GET /tasks only when the request has no limit parameter at all
    pub task_default_limit: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(Self::environment())
    }

    // APP_SERVER__PORT -> server.port
    fn environment() -> config::Environment {
        config::Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                max_body_size: 1024 * 1024,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                redis_url: String::new(),
            },
            query: QueryConfig {
                task_default_limit: Some(100),
            },
        }
    }
}
