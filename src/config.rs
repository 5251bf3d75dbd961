use clap::{Parser, ValueEnum};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: u32,
    pub query_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartSettings {
    /// Rows sent to the model when asking for a chart.
    pub sample_rows: usize,
    pub palette: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub chart: ChartSettings,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database file, or `:memory:`
    #[arg(long)]
    pub database: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

const DEFAULT_SUGGESTIONS: [&str; 5] = [
    "Show the count of legal prompts by category",
    "List the most recently created legal prompts",
    "Which prompts have a system message?",
    "How many prompts were created each month?",
    "Show the average prompt length per category",
];

pub const DEFAULT_PALETTE: [&str; 5] = ["#2563eb", "#16a34a", "#f59e0b", "#dc2626", "#7c3aed"];

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("database.connection_string", "legal-nlq.duckdb")?
            .set_default("database.pool_size", 5)?
            .set_default("database.query_timeout_secs", 30)?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000)?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.temperature", 0.1)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("chart.sample_rows", 5)?
            .set_default("chart.palette", DEFAULT_PALETTE.to_vec())?
            .set_default("suggestions", DEFAULT_SUGGESTIONS.to_vec())?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/legal-nlq/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // LEGAL_NLQ__LLM__MODEL=... overrides llm.model
        config_builder = config_builder.add_source(
            Environment::with_prefix("LEGAL_NLQ")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chart.palette.is_empty() {
            return Err(ConfigError::Message("chart.palette must not be empty".to_string()));
        }
        if self.chart.sample_rows == 0 {
            return Err(ConfigError::Message("chart.sample_rows must be at least 1".to_string()));
        }
        if self.database.query_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "database.query_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "legal-nlq.duckdb".to_string(),
                pool_size: 5,
                query_timeout_secs: 30,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.1,
                timeout_secs: 60,
            },
            chart: ChartSettings {
                sample_rows: 5,
                palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            },
            suggestions: DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(config: Option<PathBuf>) -> CliArgs {
        CliArgs {
            config,
            host: None,
            port: Some(4000),
            database: Some(":memory:".to_string()),
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn file_values_override_defaults_and_cli_overrides_file() {
        let path = std::env::temp_dir().join(format!("legal-nlq-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[web]\nport = 8080\n\n[llm]\nbackend = \"ollama\"\nmodel = \"qwen2.5-coder\"\n\n[chart]\nsample_rows = 3"
        )
        .unwrap();

        let config = AppConfig::new(&args(Some(path.clone()))).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.web.port, 4000);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "qwen2.5-coder");
        assert_eq!(config.chart.sample_rows, 3);
        assert_eq!(config.chart.palette.len(), 5);
        assert_eq!(config.database.connection_string, ":memory:");
        assert_eq!(config.database.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.suggestions, AppConfig::default().suggestions);
    }

    #[test]
    fn example_config_loads_top_level_suggestions() {
        let example = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
        let path = std::env::temp_dir().join(format!("legal-nlq-example-{}.toml", std::process::id()));
        std::fs::copy(&example, &path).unwrap();

        let config = AppConfig::new(&args(Some(path.clone()))).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.suggestions,
            [
                "Show the count of legal prompts by category",
                "List the most recently created legal prompts",
                "Which prompts have a system message?",
            ]
        );
        assert_eq!(config.llm.backend, "remote");
        assert_eq!(config.chart.sample_rows, 5);
    }
}
