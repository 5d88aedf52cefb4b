use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub cranberri: CranberriConfig,
    #[serde(default)]
    pub kyrah: KyrahConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// 支付完成后跳转的前端地址，可包含 `{ORDER_ID}` 占位符
    #[serde(default)]
    pub success_url: String,
    #[serde(default)]
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub upload_folder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CranberriConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for CranberriConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cranberri.com".to_string(),
            api_key: String::new(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KyrahConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for KyrahConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kyrah.com".to_string(),
            username: String::new(),
            password: String::new(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 6 * 3600,
        }
    }
}

/// 首次启动时创建的管理员账号（为空则跳过）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub admin_name: Option<String>,
}

fn default_page_size() -> u32 {
    100
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

impl CloudinaryConfig {
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 有配置文件则解析，否则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;
                Self::from_env_defaults(database_url)
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    fn from_env_defaults(database_url: String) -> Self {
        Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET")
                    .unwrap_or_else(|| "change-me-in-production".to_string()),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                refresh_token_expires_in: get_env_parse("JWT_REFRESH_EXPIRES_IN", 2_592_000i64),
            },
            stripe: StripeConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            cranberri: CranberriConfig::default(),
            kyrah: KyrahConfig::default(),
            sync: SyncConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }

        // Stripe
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_SUCCESS_URL") {
            self.stripe.success_url = v;
        }
        if let Ok(v) = env::var("STRIPE_CANCEL_URL") {
            self.stripe.cancel_url = v;
        }

        // Cloudinary
        if let Ok(v) = env::var("CLOUDINARY_CLOUD_NAME") {
            self.cloudinary.cloud_name = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_API_KEY") {
            self.cloudinary.api_key = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_API_SECRET") {
            self.cloudinary.api_secret = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_UPLOAD_FOLDER") {
            self.cloudinary.upload_folder = Some(v);
        }

        // 供应商钻石数据源
        if let Ok(v) = env::var("CRANBERRI_BASE_URL") {
            self.cranberri.base_url = v;
        }
        if let Ok(v) = env::var("CRANBERRI_API_KEY") {
            self.cranberri.api_key = v;
        }
        if let Ok(v) = env::var("CRANBERRI_PAGE_SIZE")
            && let Ok(n) = v.parse()
        {
            self.cranberri.page_size = n;
        }
        if let Ok(v) = env::var("KYRAH_BASE_URL") {
            self.kyrah.base_url = v;
        }
        if let Ok(v) = env::var("KYRAH_USERNAME") {
            self.kyrah.username = v;
        }
        if let Ok(v) = env::var("KYRAH_PASSWORD") {
            self.kyrah.password = v;
        }
        if let Ok(v) = env::var("KYRAH_PAGE_SIZE")
            && let Ok(n) = v.parse()
        {
            self.kyrah.page_size = n;
        }
        if let Ok(v) = env::var("SYNC_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.sync.enabled = b;
        }
        if let Ok(v) = env::var("SYNC_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.sync.interval_secs = n;
        }

        if let Ok(v) = env::var("BOOTSTRAP_ADMIN_EMAIL") {
            self.bootstrap.admin_email = Some(v);
        }
        if let Ok(v) = env::var("BOOTSTRAP_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = Some(v);
        }
        if let Ok(v) = env::var("BOOTSTRAP_ADMIN_NAME") {
            self.bootstrap.admin_name = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_uses_section_defaults() {
        let cfg = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/gemstore"
            max_connections = 5

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.database.max_connections, 5);
        assert!(!cfg.stripe.is_configured());
        assert!(!cfg.cloudinary.is_configured());
        assert!(!cfg.sync.enabled);
        assert_eq!(cfg.cranberri.page_size, 100);
        assert!(cfg.bootstrap.admin_email.is_none());
    }

    #[test]
    fn test_parse_partner_sections() {
        let cfg = Config::parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            url = "postgres://localhost/gemstore"
            max_connections = 10

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400

            [kyrah]
            base_url = "https://feed.example.com"
            username = "shop"
            password = "pw"
            page_size = 50

            [sync]
            enabled = true
            interval_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(cfg.kyrah.page_size, 50);
        assert_eq!(cfg.kyrah.username, "shop");
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.interval_secs, 600);
    }

    #[test]
    fn test_parse_rejects_missing_sections() {
        assert!(Config::parse("[server]\nhost = \"x\"\nport = 1\n").is_err());
    }
}
