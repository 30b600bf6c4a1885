use apisonator::config::Config as ApisonatorConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(flatten)]
    pub apisonator: ApisonatorConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Config used when no file is given: defaults for everything but the
    /// upstream, which flags have to provide.
    pub fn from_upstream(upstream: impl Into<String>) -> Self {
        Config {
            common: CommonConfig::default(),
            apisonator: ApisonatorConfig::new(upstream),
        }
    }

    /// Applies command line overrides on top of the loaded values.
    pub fn with_overrides(mut self, upstream: Option<String>, port: Option<u16>) -> Self {
        if let Some(upstream) = upstream {
            self.apisonator.upstream = upstream;
        }
        if let Some(port) = port {
            self.apisonator.listener.port = port;
        }
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            listener:
                host: 127.0.0.1
                port: 8080
            admin_listener:
                host: 127.0.0.1
                port: 8081
            upstream: http://apisonator:3001
            flush_interval_secs: 5
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.apisonator.upstream, "http://apisonator:3001");
        assert_eq!(config.apisonator.listener.port, 8080);
        assert_eq!(config.apisonator.flush_interval_secs, 5);
        assert_eq!(
            config.common.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125,
            })
        );
        assert!(config.common.logging.is_some());
        assert!(config.apisonator.validate().is_ok());
    }

    #[test]
    fn minimal_config() {
        let tmp = write_tmp_file("upstream: http://apisonator:3001\n");
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config, Config::from_upstream("http://apisonator:3001"));
        assert_eq!(config.common, CommonConfig::default());
        assert_eq!(config.apisonator.listener.port, 3000);
    }

    #[test]
    fn overrides() {
        let config = Config::from_upstream("http://apisonator:3001")
            .with_overrides(Some("http://other:3001".into()), Some(9090));
        assert_eq!(config.apisonator.upstream, "http://other:3001");
        assert_eq!(config.apisonator.listener.port, 9090);

        let config = Config::from_upstream("http://apisonator:3001").with_overrides(None, None);
        assert_eq!(config, Config::from_upstream("http://apisonator:3001"));
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/config.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("listener: [not, a, map]\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
