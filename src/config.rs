use clap::{Parser, ValueEnum};
use std::{env, ffi::OsString};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Hosted platform reached over REST
    Appwrite,
    /// In-process store, for local runs
    Memory,
}

/// Q&A forum API
#[derive(Parser, Debug, PartialEq)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    /// Which errors we want to log (info, warn or error)
    #[clap(short, long, default_value = "warn")]
    pub log_level: String,
    /// Which PORT the server is listening to
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Where documents, users and buckets live
    #[clap(long, value_enum, default_value = "appwrite")]
    pub backend: BackendKind,
    /// Platform API endpoint, including the version prefix
    #[clap(long, default_value = "http://localhost/v1")]
    pub appwrite_endpoint: String,
    /// Platform project identifier
    #[clap(long, default_value = "stackflow")]
    pub appwrite_project_id: String,
    /// Server API key, only ever read from APPWRITE_API_KEY
    #[clap(skip)]
    pub appwrite_api_key: Option<String>,
    /// Database holding the forum collections
    #[clap(long, default_value = crate::schema::DATABASE)]
    pub database_id: String,
}

impl Config {
    /// Parses the process arguments; `--help` and `--version` exit here.
    pub fn new() -> Result<Config, handle_errors::Error> {
        Config::with_env(Config::parse())
    }

    pub fn from_args<I, T>(args: I) -> Result<Config, handle_errors::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Config::try_parse_from(args)
            .map_err(|e| handle_errors::Error::ConfigError(e.to_string()))?;
        Config::with_env(config)
    }

    /// Environment variables win over flags.
    fn with_env(config: Config) -> Result<Config, handle_errors::Error> {
        let port = env::var("PORT")
            .ok()
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(config.port))
            .map_err(handle_errors::Error::ParseError)?;

        let backend = match env::var("STACKFLOW_BACKEND") {
            Ok(val) => BackendKind::from_str(&val, true)
                .map_err(handle_errors::Error::ConfigError)?,
            Err(_) => config.backend,
        };

        let appwrite_api_key = env::var("APPWRITE_API_KEY").ok();
        if backend == BackendKind::Appwrite && appwrite_api_key.is_none() {
            return Err(handle_errors::Error::ConfigError(
                "APPWRITE_API_KEY not set".to_string(),
            ));
        }

        let appwrite_endpoint =
            env::var("APPWRITE_ENDPOINT").unwrap_or(config.appwrite_endpoint.to_owned());
        let appwrite_project_id =
            env::var("APPWRITE_PROJECT_ID").unwrap_or(config.appwrite_project_id.to_owned());
        let database_id = env::var("APPWRITE_DATABASE_ID").unwrap_or(config.database_id.to_owned());

        Ok(Config {
            log_level: config.log_level,
            port,
            backend,
            appwrite_endpoint,
            appwrite_project_id,
            appwrite_api_key,
            database_id,
        })
    }
}
