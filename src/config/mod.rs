use std::{env, net::SocketAddr};

use anyhow::Context;

use crate::mjpeg::{http_source::StreamMode, source::DEFAULT_READ_BUFFER_BYTES};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub bind_addr: SocketAddr,
    pub source_url: Option<String>,
    pub stream_mode: StreamMode,
    pub read_buffer_bytes: usize,
    pub auto_start: bool,
    pub stream_clients: usize,
    pub log_dir: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "cycimg".to_owned());
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_owned())
            .parse()
            .context("BIND_ADDR is not a socket address")?;
        let source_url = env::var("SOURCE_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let stream_mode = match env::var("STREAM_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => StreamMode::default(),
        };
        let read_buffer_bytes = env::var("READ_BUFFER_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_READ_BUFFER_BYTES);
        let auto_start = env::var("AUTO_START")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let stream_clients = env::var("STREAM_CLIENTS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(4);
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_owned());

        Ok(Self {
            app_name,
            bind_addr,
            source_url,
            stream_mode,
            read_buffer_bytes,
            auto_start,
            stream_clients,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        sync::{Mutex, OnceLock},
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::AppConfig;
    use crate::mjpeg::http_source::StreamMode;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn reset_env() {
        for key in [
            "SOURCE_URL",
            "STREAM_MODE",
            "READ_BUFFER_BYTES",
            "AUTO_START",
            "STREAM_CLIENTS",
        ] {
            remove_env(key);
        }
        set_env("BIND_ADDR", "127.0.0.1:8080");
    }

    #[test]
    fn from_env_uses_defaults_when_unset() {
        let _guard = lock_env();
        reset_env();

        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(config.source_url, None);
        assert_eq!(config.stream_mode, StreamMode::Incremental);
        assert_eq!(config.read_buffer_bytes, 16 * 1024);
        assert!(!config.auto_start);
        assert_eq!(config.stream_clients, 4);
    }

    #[test]
    fn from_env_reads_source_settings() {
        let _guard = lock_env();
        reset_env();
        set_env("SOURCE_URL", " http://camera.local/video.mjpeg ");
        set_env("STREAM_MODE", "whole");
        set_env("READ_BUFFER_BYTES", "4096");
        set_env("AUTO_START", "true");

        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(
            config.source_url.as_deref(),
            Some("http://camera.local/video.mjpeg")
        );
        assert_eq!(config.stream_mode, StreamMode::Whole);
        assert_eq!(config.read_buffer_bytes, 4096);
        assert!(config.auto_start);
        reset_env();
    }

    #[test]
    fn from_env_rejects_unknown_stream_mode() {
        let _guard = lock_env();
        reset_env();
        set_env("STREAM_MODE", "sideways");

        let err = AppConfig::from_env().expect_err("mode should be rejected");
        assert!(err.to_string().contains("sideways"));
        reset_env();
    }

    #[test]
    fn from_env_ignores_zero_buffer_size() {
        let _guard = lock_env();
        reset_env();
        set_env("READ_BUFFER_BYTES", "0");

        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(config.read_buffer_bytes, 16 * 1024);
        reset_env();
    }

    #[test]
    fn from_env_reads_source_from_dotenv_file() {
        let _guard = lock_env();
        reset_env();

        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let path: PathBuf = std::env::temp_dir().join(format!("cycimg-dotenv-{suffix}.env"));
        fs::write(&path, "SOURCE_URL=http://dotenv.test/stream\n")
            .expect("should write temporary dotenv file");

        dotenvy::from_path_override(&path).expect("dotenv file should load");
        let config = AppConfig::from_env().expect("config should parse");
        assert_eq!(
            config.source_url.as_deref(),
            Some("http://dotenv.test/stream")
        );

        let _ = fs::remove_file(path);
        reset_env();
    }
}
