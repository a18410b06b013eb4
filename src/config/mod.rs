use std::env;
use std::time::Duration;

use jsonwebtoken::Algorithm;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub ewity_api_base_url: String,
    pub ewity_api_token: String,
    pub ewity_timeout_secs: u64,
    pub ewity_max_pages: u32,
    pub page_cache_ttl_secs: u64,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub frontend_url: String,
    pub environment: String,
    pub redis_url: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let jwt_algorithm = match get("JWT_ALGORITHM") {
            Some(value) => parse_algorithm(&value)?,
            None => Algorithm::HS256,
        };

        let jwt_expiration_secs = match get("JWT_EXPIRATION") {
            Some(value) => parse_expiration(&value).ok_or(ConfigError::Invalid {
                key: "JWT_EXPIRATION",
                value,
            })?,
            None => 24 * 3600,
        };

        let server_port = match get("PORT").or_else(|| get("SERVER_PORT")) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => 8987,
        };

        let api_base_uri = get("API_BASE_URI").unwrap_or_else(|| "/api".into());
        let api_base_uri = api_base_uri.trim_end_matches('/').to_string();

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            ewity_api_base_url: required("EWITY_API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            ewity_api_token: required("EWITY_API_TOKEN")?,
            ewity_timeout_secs: parse_or(&get, "EWITY_TIMEOUT_SECS", 30)?,
            ewity_max_pages: parse_or(&get, "EWITY_MAX_PAGES", 14)?,
            page_cache_ttl_secs: parse_or(&get, "PAGE_CACHE_TTL_SECS", 300)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_algorithm,
            jwt_expiration_secs,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port,
            api_base_uri,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            environment: get("APP_ENV").unwrap_or_else(|| "production".into()),
            redis_url: get("REDIS_URL"),
            rate_limit_window_secs: parse_or(&get, "RATE_LIMIT_WINDOW", 60)?,
            rate_limit_requests: parse_or(&get, "RATE_LIMIT_REQUESTS", 100)?,
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.page_cache_ttl_secs)
    }

    pub fn ewity_timeout(&self) -> Duration {
        Duration::from_secs(self.ewity_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    // 只支持对称密钥签名
    match value.trim().to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(ConfigError::Invalid {
            key: "JWT_ALGORITHM",
            value: value.to_string(),
        }),
    }
}

/// 解析 "24h"、"30m"、"90s"、"7d" 形式的时长，纯数字按小时计算
pub fn parse_expiration(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, multiplier) = match value.chars().last()? {
        's' => (&value[..value.len() - 1], 1),
        'm' => (&value[..value.len() - 1], 60),
        'h' => (&value[..value.len() - 1], 3600),
        'd' => (&value[..value.len() - 1], 86400),
        c if c.is_ascii_digit() => (value, 3600),
        _ => return None,
    };
    let secs = number.trim().parse::<u64>().ok()?.checked_mul(multiplier)?;
    (secs > 0).then_some(secs)
}
