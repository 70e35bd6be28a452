pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Config {
        #[serde(default)]
        pub storage: StorageBackend,
        #[serde(default)]
        pub db_url: Option<String>,
        #[serde(default = "default_port")]
        pub port: u16,
        #[serde(default = "default_static_dir")]
        pub static_dir: String,
    }

    /// Which repository backend serves the process.
    #[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum StorageBackend {
        #[default]
        Memory,
        Postgres,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_static_dir() -> String {
        "static".to_string()
    }
}
pub mod entities;
pub mod todo;
pub mod web;
