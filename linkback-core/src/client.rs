//! # Cliente do Anotador Remoto
//!
//! Acesso ao serviço externo de anotação/tagging com cache persistente e retry.
//!
//! ## Contrato de uma Requisição
//!
//! Para cada `(endpoint, parâmetros, payload)`:
//!
//! 1. `chave = URL canônica com parâmetros + payload serializado`.
//! 2. Se a chave está no cache, a resposta guardada é devolvida sem ir à rede.
//!    Um hit nunca é revalidado.
//! 3. Caso contrário faz o `POST`. Um status de erro é registrado no log, mas o
//!    corpo ainda é interpretado.
//! 4. Uma resposta JSON válida é comprimida e guardada no cache.
//! 5. Qualquer falha nos passos 2–4 espera `backoff` e refaz a requisição inteira,
//!    até `retry_budget` vezes. Esgotado o orçamento, a falha vai para quem chamou.
//!
//! Tudo é bloqueante e roda na thread de quem chama.
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkback_core::{AnnotationCache, ClientConfig, RemoteAnnotationClient};
//!
//! let cache = Arc::new(AnnotationCache::open("wat.cache").unwrap());
//! let client = RemoteAnnotationClient::new(ClientConfig::new("localhost", 8080, "base"), cache).unwrap();
//!
//! for ann in client.annotate("barack obama visited paris").unwrap() {
//!     println!("{}+{} -> {} ({:.2})", ann.position, ann.length, ann.entity, ann.score);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::annotation::{Mention, MultipleAnnotation, ScoredAnnotation, ScoredTag, Tag};
use crate::cache::AnnotationCache;
use crate::config::ClientConfig;
use crate::error::{AnnotationError, AnnotationResult, CacheError, TransportError};
use crate::transport::{HttpTransport, Transport};
use crate::wire::{parse, RequestPayload, SpotResponse, TagResponse};

/// Endpoints expostos pelo serviço.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Tag,
    Spot,
    Disambiguate,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Tag => "tag",
            Endpoint::Spot => "spot",
            Endpoint::Disambiguate => "disambiguate",
        }
    }
}

/// Diagnósticos do serviço para um trecho desambiguado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionDiagnostics {
    pub link_probability: f64,
    pub commonness: f64,
    pub rho: f64,
    /// `1 / (1 + ambiguidade)`.
    pub ambiguity: f64,
    pub local_coherence: f64,
    pub page_rank: f64,
}

/// Diagnósticos de um candidato no ranking de um trecho.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDiagnostics {
    pub entity: Tag,
    pub rank: usize,
    pub commonness: f64,
    pub score: f64,
    pub page_rank: f64,
    pub synonymy: u32,
    pub link_probability: f64,
    pub ambiguity: f64,
}

/// Resultado de [`RemoteAnnotationClient::disambiguate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationOutcome {
    /// Só as anotações cujo trecho estava entre as mentions pedidas.
    pub annotations: Vec<ScoredAnnotation>,
    /// Indexado pelo texto do trecho.
    pub mention_info: HashMap<String, MentionDiagnostics>,
    pub candidate_info: HashMap<String, Vec<CandidateDiagnostics>>,
}

/// Falha de uma única tentativa.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("JSON inválido: {0}")]
    Malformed(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AttemptError {
    fn into_annotation_error(self, attempts: u32) -> AnnotationError {
        match self {
            AttemptError::Transport(e) => AnnotationError::NoResponse {
                attempts,
                message: e.to_string(),
            },
            AttemptError::Malformed(msg) => AnnotationError::Unparsable(msg),
            AttemptError::Cache(e) => AnnotationError::Cache(e),
        }
    }
}

/// Cliente do anotador remoto.
///
/// Pode ser compartilhado entre threads; o único estado mutável compartilhado é o
/// [`AnnotationCache`]. Duas requisições simultâneas para a mesma chave ainda não
/// cacheada podem ir as duas à rede (a última escrita vence).
pub struct RemoteAnnotationClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    cache: Arc<AnnotationCache>,
    last_time: AtomicU64,
}

impl RemoteAnnotationClient {
    /// Cria o cliente com o transporte HTTP padrão.
    pub fn new(config: ClientConfig, cache: Arc<AnnotationCache>) -> AnnotationResult<Self> {
        let transport = HttpTransport::new(config.read_timeout)?;
        Ok(Self::with_transport(config, Box::new(transport), cache))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Box<dyn Transport>,
        cache: Arc<AnnotationCache>,
    ) -> Self {
        Self {
            config,
            transport,
            cache,
            last_time: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AnnotationCache> {
        &self.cache
    }

    /// Descrição legível da configuração.
    pub fn name(&self) -> String {
        format!(
            "WAT (method={} epsilon={} usecontext={} relatedness={} sortby={})",
            self.config.method,
            if self.config.epsilon.is_empty() { "default" } else { self.config.epsilon.as_str() },
            self.config.use_context,
            self.config.relatedness,
            self.config.sort_by,
        )
    }

    /// Tempo de processamento (`time.total`) informado pela última resposta.
    pub fn last_annotation_time(&self) -> u64 {
        self.last_time.load(Ordering::Relaxed)
    }

    /// Conjunto completo de parâmetros, na ordem em que vão para a URL.
    ///
    /// Parâmetros vazios são omitidos; as três flags booleanas vão sempre.
    pub fn full_parameters(&self, min_commonness: &str, epsilon: &str, kappa: &str) -> Vec<(&'static str, String)> {
        let cfg = &self.config;
        let mut params = vec![("lang", cfg.language.clone())];
        push_non_empty(&mut params, "method", &cfg.method);
        push_non_empty(&mut params, "windowSize", &cfg.window_size);
        push_non_empty(&mut params, "epsilon", epsilon);
        push_non_empty(&mut params, "minCommonness", min_commonness);
        push_non_empty(&mut params, "kappa", kappa);
        push_non_empty(&mut params, "minLinkProbability", &cfg.min_link_probability);
        push_non_empty(&mut params, "relatedness", &cfg.relatedness);
        push_non_empty(&mut params, "sortBy", &cfg.sort_by);
        params.push(("bogusFilter", cfg.bogus_filter.to_string()));
        params.push(("useTagger", cfg.use_tagger.to_string()));
        params.push(("useContext", cfg.use_context.to_string()));
        params
    }

    fn default_parameters(&self) -> Vec<(&'static str, String)> {
        self.full_parameters(&self.config.min_commonness, &self.config.epsilon, &self.config.kappa)
    }

    fn reduced_parameters(&self) -> Vec<(&'static str, String)> {
        let cfg = &self.config;
        let mut params = vec![("lang", cfg.language.clone())];
        push_non_empty(&mut params, "method", &cfg.method);
        push_non_empty(&mut params, "windowSize", &cfg.window_size);
        push_non_empty(&mut params, "epsilon", &cfg.epsilon);
        push_non_empty(&mut params, "minCommonness", &cfg.min_commonness);
        params
    }

    /// URL canônica do endpoint com os parâmetros já codificados.
    pub fn endpoint_url(&self, endpoint: Endpoint, params: &[(&str, String)]) -> AnnotationResult<Url> {
        let raw = format!("{}/{}", self.config.base_url(), endpoint.path());
        let mut url = Url::parse(&raw).map_err(|e| AnnotationError::InvalidEndpoint(format!("{raw}: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// Chave de cache: URL completa seguida do payload serializado.
    pub fn cache_key(url: &Url, payload: &RequestPayload) -> String {
        format!("{}{}", url.as_str(), payload.to_json())
    }

    /// Executa uma requisição com cache e retry e devolve o JSON da resposta.
    pub fn query_json(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        payload: &RequestPayload,
    ) -> AnnotationResult<serde_json::Value> {
        let url = self.endpoint_url(endpoint, params)?;
        let body = payload.to_json();
        let key = Self::cache_key(&url, payload);
        let attempts = self.config.retry_budget + 1;

        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.attempt(&url, &key, &body) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt, attempts, url = %url, "Falha ao consultar o anotador: {}", e);
                    last_error = Some(e);
                    if attempt < attempts {
                        thread::sleep(self.config.backoff);
                    }
                }
            }
        }

        let err = match last_error {
            Some(e) => e.into_annotation_error(attempts),
            None => AnnotationError::NoResponse {
                attempts,
                message: "nenhuma tentativa realizada".to_string(),
            },
        };
        error!("Anotador indisponível para {} com texto de {} bytes: {}", url, payload.text.len(), err);
        Err(err)
    }

    fn attempt(&self, url: &Url, key: &str, body: &str) -> Result<serde_json::Value, AttemptError> {
        if let Some(cached) = self.cache.get(key) {
            match serde_json::from_str(&cached) {
                Ok(value) => {
                    debug!("Cache hit para {}", url);
                    return Ok(value);
                }
                Err(e) => warn!("Resposta cacheada ilegível, refazendo a requisição: {}", e),
            }
        }

        let response = self.transport.post_json(url.as_str(), body)?;
        if !response.is_success() {
            error!("Erro HTTP {} do anotador. Mensagem: {}", response.status, response.body);
        }

        let value: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| AttemptError::Malformed(e.to_string()))?;
        self.cache.put(key, &value.to_string())?;
        Ok(value)
    }

    fn record_time(&self, total: u64) {
        self.last_time.store(total, Ordering::Relaxed);
    }

    /// Anota o texto inteiro: uma anotação por trecho, com score = `rho`.
    pub fn annotate(&self, text: &str) -> AnnotationResult<Vec<ScoredAnnotation>> {
        let value = self.query_json(Endpoint::Tag, &self.default_parameters(), &RequestPayload::text(text))?;
        let response: TagResponse = parse(value)?;
        self.record_time(response.time.total);

        Ok(response
            .annotations
            .iter()
            .map(|a| ScoredAnnotation::new(Mention::from_bounds(a.start, a.end), Tag(a.id), a.rho as f32))
            .collect())
    }

    /// Todas as entidades candidatas do texto com seus scores, sem posição.
    pub fn scored_tags(&self, text: &str) -> AnnotationResult<Vec<ScoredTag>> {
        let value = self.query_json(Endpoint::Tag, &self.reduced_parameters(), &RequestPayload::text(text))?;
        let response: TagResponse = parse(value)?;
        self.record_time(response.time.total);

        Ok(response
            .annotations
            .iter()
            .flat_map(|a| a.ranking.iter())
            .map(|c| ScoredTag {
                entity: Tag(c.id),
                score: c.score as f32,
            })
            .collect())
    }

    /// Trechos que o serviço reconhece como possíveis menções.
    pub fn spot_mentions(&self, text: &str) -> AnnotationResult<HashSet<Mention>> {
        let params = vec![("lang", self.config.language.clone())];
        let value = self.query_json(Endpoint::Spot, &params, &RequestPayload::text(text))?;
        let response: SpotResponse = parse(value)?;

        Ok(response
            .spots
            .iter()
            .map(|s| Mention::from_bounds(s.start, s.end))
            .collect())
    }

    /// Trechos reconhecidos com o ranking de entidades candidatas de cada um.
    pub fn spot_candidates(&self, text: &str) -> AnnotationResult<Vec<MultipleAnnotation>> {
        let params = vec![
            ("lang", self.config.language.clone()),
            ("includeEntities", "true".to_string()),
            ("sortBy", "SCORE".to_string()),
        ];
        let value = self.query_json(Endpoint::Spot, &params, &RequestPayload::text(text))?;
        let response: SpotResponse = parse(value)?;

        Ok(response
            .spots
            .iter()
            .map(|s| MultipleAnnotation {
                mention: Mention::from_bounds(s.start, s.end),
                candidates: s.ranking.iter().map(|c| Tag(c.id)).collect(),
            })
            .collect())
    }

    /// Desambigua as mentions dadas com os parâmetros configurados.
    ///
    /// Com `disambiguate_via_annotate`, anota o texto inteiro e mantém só as anotações
    /// sobre as mentions pedidas, sem diagnósticos.
    pub fn disambiguate(&self, text: &str, mentions: &HashSet<Mention>) -> AnnotationResult<DisambiguationOutcome> {
        let cfg = &self.config;
        if cfg.disambiguate_via_annotate {
            let annotations = self
                .annotate(text)?
                .into_iter()
                .filter(|a| mentions.contains(&a.mention()))
                .collect();
            return Ok(DisambiguationOutcome {
                annotations,
                ..DisambiguationOutcome::default()
            });
        }
        self.disambiguate_with(text, mentions, &cfg.min_commonness, &cfg.epsilon, &cfg.kappa)
    }

    /// Desambigua as mentions dadas sobrescrevendo `minCommonness`, `epsilon` e `kappa`.
    pub fn disambiguate_with(
        &self,
        text: &str,
        mentions: &HashSet<Mention>,
        min_commonness: &str,
        epsilon: &str,
        kappa: &str,
    ) -> AnnotationResult<DisambiguationOutcome> {
        let params = self.full_parameters(min_commonness, epsilon, kappa);
        let payload = RequestPayload::with_mentions(text, mentions.iter());
        let value = self.query_json(Endpoint::Disambiguate, &params, &payload)?;
        let response: TagResponse = parse(value)?;
        self.record_time(response.time.total);

        let mut outcome = DisambiguationOutcome::default();
        for ann in &response.annotations {
            let mention = Mention::from_bounds(ann.start, ann.end);
            if mentions.contains(&mention) {
                outcome
                    .annotations
                    .push(ScoredAnnotation::new(mention, Tag(ann.id), ann.rho as f32));
            }

            let ambiguity = 1.0 / (1.0 + ann.ambiguity as f64);
            let surface = mention.slice(text);
            outcome.mention_info.insert(
                surface.clone(),
                MentionDiagnostics {
                    link_probability: ann.link_prob,
                    commonness: ann.commonness,
                    rho: ann.rho,
                    ambiguity,
                    local_coherence: ann.local_coherence,
                    page_rank: ann.page_rank,
                },
            );

            let candidates = outcome.candidate_info.entry(surface).or_default();
            for (rank, cand) in ann.ranking.iter().enumerate() {
                candidates.push(CandidateDiagnostics {
                    entity: Tag(cand.id),
                    rank,
                    commonness: cand.commonness,
                    score: cand.score,
                    page_rank: cand.page_rank,
                    synonymy: cand.synonymy,
                    link_probability: ann.link_prob,
                    ambiguity,
                });
            }
        }
        Ok(outcome)
    }
}

fn push_non_empty(params: &mut Vec<(&'static str, String)>, name: &'static str, value: &str) {
    if !value.is_empty() {
        params.push((name, value.to_string()));
    }
}
