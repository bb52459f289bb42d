use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct TirelireConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub urls: PublicUrls,
    pub uploads: UploadConfig,
    pub face_match: FaceMatchConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Where accounts, tokens, KYC records and groups are persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Mongo,
    /// Process-local maps; data is lost on restart. Refused in production.
    Memory,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Signing material and lifetimes for session and single-use tokens.
///
/// RS256 is used when both key paths are set, HS256 with `secret` otherwise.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    pub access_token_expiry_minutes: i64,
    pub email_token_expiry_hours: i64,
    pub reset_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct PublicUrls {
    /// Base URL of this API, used to build `/uploads/...` references.
    pub api_url: String,
    /// Base URL of the web client, used in verification and reset links.
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: String,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct FaceMatchConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Reverse proxies whose `X-Forwarded-For` entries are believed.
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl TirelireConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = TirelireConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("tirelire-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store: get_env("STORE_BACKEND", Some("mongo"), false)?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("tirelire"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
                private_key_path: env::var("JWT_PRIVATE_KEY_PATH").ok(),
                public_key_path: env::var("JWT_PUBLIC_KEY_PATH").ok(),
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "60",
                    is_prod,
                )?,
                email_token_expiry_hours: parse_env("EMAIL_TOKEN_EXPIRY_HOURS", "24", is_prod)?,
                reset_token_expiry_minutes: parse_env(
                    "RESET_TOKEN_EXPIRY_MINUTES",
                    "60",
                    is_prod,
                )?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                port: parse_env("SMTP_PORT", "1025", is_prod)?,
                user: env::var("SMTP_USER").ok().filter(|s| !s.is_empty()),
                password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
                from: get_env("MAIL_FROM", Some("Tirelire <no-reply@tirelire.local>"), is_prod)?,
            },
            urls: PublicUrls {
                api_url: get_env("API_URL", Some("http://localhost:8080"), is_prod)?,
                frontend_url: get_env("FRONTEND_URL", Some("http://localhost:3000"), is_prod)?,
            },
            uploads: UploadConfig {
                dir: get_env("UPLOAD_DIR", Some("./uploads"), false)?,
                max_image_bytes: parse_env("UPLOAD_MAX_IMAGE_BYTES", "5242880", false)?,
            },
            face_match: FaceMatchConfig {
                url: get_env("FACE_MATCH_URL", Some("http://localhost:5001/compare"), is_prod)?,
                timeout_seconds: parse_env("FACE_MATCH_TIMEOUT_SECONDS", "15", false)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                trusted_proxies: parse_ip_list(&get_env("TRUSTED_PROXIES", Some(""), false)?)?,
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", false)?,
                register_attempts: parse_env("RATE_LIMIT_REGISTER_ATTEMPTS", "5", false)?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                password_reset_attempts: parse_env(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    "3",
                    false,
                )?,
                password_reset_window_seconds: parse_env(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", false)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 && self.is_prod() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0
            || self.jwt.email_token_expiry_hours <= 0
            || self.jwt.reset_token_expiry_minutes <= 0
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token lifetimes must be positive"
            )));
        }

        let has_rsa = self.jwt.private_key_path.is_some() && self.jwt.public_key_path.is_some();
        match &self.jwt.secret {
            None if !has_rsa => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET or JWT_PRIVATE_KEY_PATH/JWT_PUBLIC_KEY_PATH must be set"
                )));
            }
            Some(secret) if !has_rsa && secret.len() < 32 => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least 32 bytes"
                )));
            }
            _ => {}
        }

        if self.uploads.max_image_bytes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPLOAD_MAX_IMAGE_BYTES must be positive"
            )));
        }

        if self.is_prod() {
            if self.store == StoreBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND=memory is not allowed in production"
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid TRUSTED_PROXIES entry {}: {}", s, e))
            })
        })
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    // Numeric knobs always have a sane default, so only prod-required keys fail when unset.
    let raw = match env::var(key) {
        Ok(val) => val,
        Err(_) if is_prod && default.is_empty() => {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            )))
        }
        Err(_) => default.to_string(),
    };

    raw.trim().parse::<T>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
