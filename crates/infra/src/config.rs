//! Configuration loading and representation.
//!
//! | Key | Default | Notes |
//! |---|---|---|
//! | `GYMPAL_BIND_ADDR` | `127.0.0.1:8080` | socket address of the app shell |
//! | `GYMPAL_BACKEND` | `in-memory` | `in-memory` or `supabase` |
//! | `SUPABASE_URL` | | required for `supabase` |
//! | `SUPABASE_ANON_KEY` | | required for `supabase` |

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required when GYMPAL_BACKEND={backend}")]
    Missing { key: &'static str, backend: &'static str },

    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Hosted Supabase project.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL without trailing slash, e.g. `https://abc.supabase.co`.
    pub url: String,
    pub anon_key: String,
}

impl core::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    InMemory,
    Supabase(SupabaseConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::InMemory => "in-memory",
            BackendConfig::Supabase(_) => "supabase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendConfig,
}

impl AppConfig {
    /// Development defaults: loopback bind, in-memory backend.
    pub fn in_memory() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            backend: BackendConfig::InMemory,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_addr = get("GYMPAL_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            key: "GYMPAL_BIND_ADDR",
            value: raw_addr.clone(),
            reason: e.to_string(),
        })?;

        let backend = match get("GYMPAL_BACKEND").as_deref() {
            None | Some("in-memory") => BackendConfig::InMemory,
            Some("supabase") => {
                let missing = |key| ConfigError::Missing {
                    key,
                    backend: "supabase",
                };
                let url = get("SUPABASE_URL").ok_or_else(|| missing("SUPABASE_URL"))?;
                let anon_key = get("SUPABASE_ANON_KEY").ok_or_else(|| missing("SUPABASE_ANON_KEY"))?;

                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(ConfigError::Invalid {
                        key: "SUPABASE_URL",
                        value: url,
                        reason: "must be an http(s) URL".to_string(),
                    });
                }

                BackendConfig::Supabase(SupabaseConfig {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                })
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "GYMPAL_BACKEND",
                    value: other.to_string(),
                    reason: "expected `in-memory` or `supabase`".to_string(),
                });
            }
        };

        Ok(Self { bind_addr, backend })
    }
}
