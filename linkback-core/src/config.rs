//! # Configuração
//!
//! Parâmetros do cliente remoto, do cache e do resolvedor. Todos implementam
//! `Default` com os valores históricos do anotador e podem ser lidos de JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Número de tentativas extras após a primeira.
pub const DEFAULT_RETRY_BUDGET: u32 = 2;
/// Espera fixa entre tentativas.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(3000);
/// O cache é gravado em disco a cada N escritas.
pub const DEFAULT_FLUSH_EVERY: u64 = 200;

/// Configuração do cliente do anotador remoto.
///
/// Strings vazias significam "não enviar o parâmetro" e deixam o serviço usar seu default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub language: String,
    /// Método de desambiguação.
    pub method: String,
    pub sort_by: String,
    pub relatedness: String,
    pub epsilon: String,
    pub min_link_probability: String,
    pub window_size: String,
    pub min_commonness: String,
    pub kappa: String,
    pub use_context: bool,
    pub use_tagger: bool,
    pub bogus_filter: bool,
    /// Tentativas extras após a primeira falha (total = `retry_budget + 1`).
    pub retry_budget: u32,
    #[serde(with = "millis")]
    pub backoff: Duration,
    /// `None` = espera indefinidamente pela resposta.
    #[serde(with = "opt_millis")]
    pub read_timeout: Option<Duration>,
    /// Responde `disambiguate` anotando o texto inteiro e filtrando pelas mentions.
    pub disambiguate_via_annotate: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            language: "en".to_string(),
            method: String::new(),
            sort_by: "PAGERANK".to_string(),
            relatedness: "mw".to_string(),
            epsilon: String::new(),
            min_link_probability: String::new(),
            window_size: String::new(),
            min_commonness: String::new(),
            kappa: String::new(),
            use_context: false,
            use_tagger: false,
            bogus_filter: false,
            retry_budget: DEFAULT_RETRY_BUDGET,
            backoff: DEFAULT_BACKOFF,
            read_timeout: None,
            disambiguate_via_annotate: false,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, method: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            method: method.into(),
            ..Self::default()
        }
    }

    /// URL base dos endpoints (`http://host:port/tag`).
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/tag", self.host, self.port)
    }
}

/// Configuração do cache persistente.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub flush_every: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

/// O que fazer quando dois grupos escolhem o mesmo bold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// O grupo que aparece depois sobrescreve o anterior.
    #[default]
    LastWriteWins,
    /// Fica o grupo com a menor distância (empate: o primeiro).
    BestDistanceWins,
}

/// Configuração do resolvedor de link-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    pub collision_policy: CollisionPolicy,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.retry_budget, 2);
        assert_eq!(cfg.backoff, Duration::from_secs(3));
        assert_eq!(cfg.read_timeout, None);
        assert!(!cfg.disambiguate_via_annotate);
        assert_eq!(cfg.sort_by, "PAGERANK");
        assert_eq!(CacheConfig::default().flush_every, 200);
        assert_eq!(ResolverConfig::default().collision_policy, CollisionPolicy::LastWriteWins);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: ClientConfig =
            serde_json::from_str(r#"{"host": "wat.local", "port": 9000, "read_timeout": 1500}"#).unwrap();
        assert_eq!(cfg.base_url(), "http://wat.local:9000/tag");
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.language, "en");
    }

    #[test]
    fn test_policy_snake_case() {
        let p: CollisionPolicy = serde_json::from_str(r#""best_distance_wins""#).unwrap();
        assert_eq!(p, CollisionPolicy::BestDistanceWins);
    }
}
