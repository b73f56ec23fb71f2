use std::time::Duration;

/// Store connection configuration.
///
/// A plain record handed to [`crate::Client`] at construction time; nothing
/// here lives in global mutable state. The address format follows the
/// conventional `redis://` URL shape.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store host.
    pub host: String,

    /// Store port.
    pub port: u16,

    /// Logical database index.
    pub database: u32,

    /// Optional password.
    pub password: Option<String>,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Per-operation response timeout.
    pub response_timeout: Option<Duration>,

    /// Upper bound for backend connection handles.
    pub max_connections: usize,
}

impl StoreConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: 0,
            password: None,
            connect_timeout: Duration::from_secs(30),
            response_timeout: None,
            max_connections: 10,
        }
    }

    /// Set the logical database index
    pub fn database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    /// Set the password
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-operation response timeout
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Set the connection cap
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Parse from a connection URL.
    ///
    /// Format: `redis://[:password@]host[:port][/database]`
    pub fn from_url(url: &str) -> Result<Self, String> {
        let rest = url
            .strip_prefix("redis://")
            .ok_or_else(|| "URL must start with 'redis://'".to_string())?;

        let (auth, rest) = match rest.split_once('@') {
            Some((auth, rest)) => (Some(auth), rest),
            None => (None, rest),
        };

        let password = match auth {
            Some(auth) => {
                let password = auth
                    .strip_prefix(':')
                    .ok_or_else(|| "Invalid credentials format".to_string())?;
                Some(password.to_string())
            }
            None => None,
        };

        let (host_port, database) = match rest.split_once('/') {
            Some((host_port, database)) => {
                let database = database
                    .parse::<u32>()
                    .map_err(|_| "Invalid database index".to_string())?;
                (host_port, database)
            }
            None => (rest, 0),
        };

        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| "Invalid port".to_string())?;
                (host, port)
            }
            None => (host_port, 6379),
        };

        if host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }

        let mut config = Self::new(host, port).database(database);
        config.password = password;
        Ok(config)
    }

    /// Convert to a connection URL, masking the password.
    pub fn to_url(&self) -> String {
        let auth = if self.password.is_some() { ":***@" } else { "" };
        format!(
            "redis://{}{}:{}/{}",
            auth, self.host, self.port, self.database
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("localhost", 6379)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.database, 0);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::new("cache.example.com", 6380)
            .database(3)
            .password("secret")
            .max_connections(20);

        assert_eq!(config.host, "cache.example.com");
        assert_eq!(config.port, 6380);
        assert_eq!(config.database, 3);
        assert_eq!(config.max_connections, 20);
    }

    #[test]
    fn test_from_url() {
        let config = StoreConfig::from_url("redis://:hunter2@db.example.com:6380/2").unwrap();
        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 6380);
        assert_eq!(config.database, 2);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_from_url_defaults() {
        let config = StoreConfig::from_url("redis://localhost").unwrap();
        assert_eq!(config.port, 6379);
        assert_eq!(config.database, 0);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_invalid_url() {
        assert!(StoreConfig::from_url("http://localhost").is_err());
        assert!(StoreConfig::from_url("redis://").is_err());
        assert!(StoreConfig::from_url("redis://localhost:notaport").is_err());
        assert!(StoreConfig::from_url("redis://localhost/notadb").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::new("", 6379).validate().is_err());
        assert!(
            StoreConfig::default()
                .max_connections(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_to_url_hides_password() {
        let config = StoreConfig::default().password("secret123");
        let url = config.to_url();
        assert!(!url.contains("secret123"));
        assert!(url.contains("***"));
    }
}
