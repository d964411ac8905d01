use emoface_core::{AnalyzerConfig, TensorLayout};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (`PORT`, default 5000).
    pub port: u16,
    /// Listen address (default 0.0.0.0).
    pub bind: IpAddr,
    /// Directory uploads are written to and served from.
    pub upload_dir: PathBuf,
    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
    pub analyzer: AnalyzerConfig,
}

impl Config {
    /// Load configuration from `PORT` and `EMOFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("EMOFACE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| emoface_core::default_model_dir());

        let layout = match std::env::var("EMOFACE_CLASSIFIER_LAYOUT") {
            Ok(raw) => raw.parse::<TensorLayout>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to nhwc layout");
                TensorLayout::default()
            }),
            Err(_) => TensorLayout::default(),
        };

        let mut analyzer = AnalyzerConfig::new(model_dir);
        analyzer.labels_path = std::env::var("EMOFACE_LABELS_PATH").ok().map(PathBuf::from);
        analyzer.layout = layout;
        analyzer.face_detection = env_bool("EMOFACE_FACE_DETECTION", true);
        analyzer.enforce_detection = env_bool("EMOFACE_ENFORCE_DETECTION", false);

        Self {
            port: env_parse("PORT", 5000),
            bind: env_parse("EMOFACE_BIND", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            upload_dir: std::env::var("EMOFACE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/uploads")),
            max_upload_bytes: env_parse::<usize>("EMOFACE_MAX_UPLOAD_MB", 16) * 1024 * 1024,
            analyzer,
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back() {
        assert_eq!(env_parse("EMOFACE_TEST_UNSET_PORT", 5000u16), 5000);
        std::env::set_var("EMOFACE_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env_parse("EMOFACE_TEST_BAD_PORT", 5000u16), 5000);
        std::env::set_var("EMOFACE_TEST_GOOD_PORT", " 8080 ");
        assert_eq!(env_parse("EMOFACE_TEST_GOOD_PORT", 5000u16), 8080);
    }

    #[test]
    fn test_env_bool() {
        assert!(env_bool("EMOFACE_TEST_UNSET_BOOL", true));
        std::env::set_var("EMOFACE_TEST_BOOL_OFF", "0");
        assert!(!env_bool("EMOFACE_TEST_BOOL_OFF", true));
        std::env::set_var("EMOFACE_TEST_BOOL_ON", "1");
        assert!(env_bool("EMOFACE_TEST_BOOL_ON", false));
    }

    #[test]
    fn test_listen_addr() {
        let mut config = Config::from_env();
        config.port = 5050;
        config.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:5050");
    }
}
