use std::path::PathBuf;

use crate::error::ConfigError;
use crate::inference::ModelSource;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL_PATH: &str = "models/crop_model.onnx";
const DEFAULT_LABELS_PATH: &str = "models/crop_labels.json";
const DEFAULT_MODEL_OUTPUT: &str = "output_probability";
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_JSON_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model: ModelSource,
    pub allowed_origins: Vec<String>,
    pub json_limit: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from any variable source; unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var(&lookup, "PORT", "a port number")?.unwrap_or(DEFAULT_PORT);
        let workers = match parse_var::<usize>(&lookup, "WORKERS", "a positive integer")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    var: "WORKERS",
                    expected: "a positive integer",
                    value: "0".to_string(),
                })
            }
            Some(workers) => workers,
            None => num_cpus::get(),
        };
        let json_limit = parse_var(&lookup, "JSON_LIMIT_BYTES", "a byte count")?
            .unwrap_or(DEFAULT_JSON_LIMIT);

        let model = ModelSource {
            model_path: PathBuf::from(
                lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            ),
            labels_path: PathBuf::from(
                lookup("LABELS_PATH").unwrap_or_else(|| DEFAULT_LABELS_PATH.to_string()),
            ),
            output: match lookup("MODEL_OUTPUT") {
                Some(name) if name.trim().is_empty() => None,
                Some(name) => Some(name.trim().to_string()),
                None => Some(DEFAULT_MODEL_OUTPUT.to_string()),
            },
        };

        let allowed_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![DEFAULT_ORIGIN.to_string()],
        };
        if allowed_origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }

        Ok(Self {
            host,
            port,
            workers,
            model,
            allowed_origins,
            json_limit,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert!(config.workers >= 1);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.model.model_path, PathBuf::from("models/crop_model.onnx"));
        assert_eq!(config.model.output.as_deref(), Some("output_probability"));
        assert_eq!(config.json_limit, 65536);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9090"),
            ("WORKERS", "2"),
            ("MODEL_PATH", "/srv/rf.onnx"),
            ("MODEL_OUTPUT", ""),
            ("CORS_ALLOWED_ORIGINS", "https://farm.example, http://localhost:5173 ,"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9090");
        assert_eq!(config.workers, 2);
        assert_eq!(config.model.model_path, PathBuf::from("/srv/rf.onnx"));
        assert_eq!(config.model.output, None);
        assert_eq!(
            config.allowed_origins,
            vec!["https://farm.example", "http://localhost:5173"]
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("WORKERS", "0")]),
            Err(ConfigError::Invalid { var: "WORKERS", .. })
        ));
    }

    #[test]
    fn rejects_empty_origin_list() {
        assert!(matches!(
            config(&[("CORS_ALLOWED_ORIGINS", " , ")]),
            Err(ConfigError::NoOrigins)
        ));
    }
}
