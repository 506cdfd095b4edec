//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 빈 방의 상태를 유지하는 시간 (ms)
    pub idle_timeout_ms: u64,
    /// 빈 방 정리 주기 (초)
    pub cleanup_interval_secs: u64,
    pub max_id_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            room: RoomConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 3_600_000,
            cleanup_interval_secs: 300,
            max_id_len: 128,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            port: env_parse("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.cors_origins),
            room: RoomConfig {
                idle_timeout_ms: env_parse("ROOM_IDLE_TIMEOUT", defaults.room.idle_timeout_ms),
                cleanup_interval_secs: env_parse(
                    "ROOM_CLEANUP_INTERVAL",
                    defaults.room.cleanup_interval_secs,
                ),
                max_id_len: env_parse("MAX_ROOM_ID_LEN", defaults.room.max_id_len),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 클라이언트 설정 (연결 감시자, 코드 실행 서비스)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub execution_url: String,
    pub probe: ProbeConfig,
    pub reconnect: ReconnectConfig,
}

/// 서버 생존 확인 설정
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub timeout: Duration,
    /// 시도 간 대기 시간 단위 (시도 순번 × step)
    pub backoff_step: Duration,
}

/// 재연결 설정
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub attempts: u32,
    pub connect_timeout: Duration,
    pub delay: Duration,
    pub delay_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            execution_url: "https://emkc.org/api/v2/piston/execute".to_string(),
            probe: ProbeConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            timeout: Duration::from_secs(5),
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            connect_timeout: Duration::from_secs(10),
            delay: Duration::from_secs(1),
            delay_max: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            execution_url: env::var("EXECUTION_URL").unwrap_or(defaults.execution_url),
            ..defaults
        }
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// 생존 확인 대상 (서버 루트)
    pub fn probe_url(&self) -> String {
        format!("{}/", self.backend_url.trim_end_matches('/'))
    }

    /// 백엔드 URL을 WebSocket 엔드포인트로 변환
    pub fn ws_url(&self) -> String {
        let base = self.backend_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/ws")
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_follows_backend_scheme() {
        let config = ClientConfig::default().with_backend_url("https://sync.example.com/");
        assert_eq!(config.ws_url(), "wss://sync.example.com/ws");

        let config = ClientConfig::default().with_backend_url("http://127.0.0.1:5000");
        assert_eq!(config.ws_url(), "ws://127.0.0.1:5000/ws");
        assert_eq!(config.probe_url(), "http://127.0.0.1:5000/");
    }

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(
            split_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn client_defaults_match_supervisor_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.probe.attempts, 10);
        assert_eq!(config.probe.timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.attempts, 10);
        assert_eq!(config.reconnect.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.delay_max, Duration::from_secs(5));
    }
}
