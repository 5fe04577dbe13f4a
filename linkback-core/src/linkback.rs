//! # Link-back de Bolds para a Consulta
//!
//! Dado o texto original da consulta e grupos de bolds (variantes de superfície
//! que apontam para a mesma entidade), produz anotações disjuntas sobre a consulta
//! que explicam o máximo possível de suas palavras.
//!
//! ## Algoritmo
//!
//! 1. **Resolução dos grupos**: em cada grupo, escolhe o bold com menor
//!    [`min_edit_dist`](crate::text_match::min_edit_dist) contra a consulta. O título
//!    canônico da entidade pode apertar essa distância, mas o span é sempre
//!    recuperado a partir do bold vencedor.
//! 2. **Candidatos**: para cada par `(bold, entidade)`, a distância e as palavras da
//!    consulta casadas com cada palavra do bold.
//! 3. **Ordenação** estável por distância crescente.
//! 4. **Cobertura gulosa**: percorre os candidatos marcando as palavras da consulta
//!    como cobertas. Cada candidato que ainda cobre algo emite um span contíguo.
//!
//! Passada única, sem backtracking.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use linkback_core::{BoldGroup, LinkBackResolver, NoTitles, Tag};
//!
//! let resolver = LinkBackResolver::new(NoTitles);
//! let groups = vec![
//!     (BoldGroup::new(["Obama"]), Tag(1)),
//!     (BoldGroup::new(["Paris"]), Tag(2)),
//! ];
//! let anns = resolver.link_back("Barack Obama visited Paris", &groups);
//! assert_eq!(anns.len(), 2);
//! ```

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotation::{BoldGroup, Mention, ScoredAnnotation, Tag};
use crate::config::{CollisionPolicy, ResolverConfig};
use crate::error::TitleLookupError;
use crate::text_match::min_edit_match_tokens;
use crate::tokenizer::{tokenize, tokenize_query, Token};

/// Score constante das anotações produzidas pelo link-back.
pub const LINKBACK_SCORE: f32 = 1.0;

/// Busca do título canônico de uma entidade.
pub trait TitleLookup {
    fn title(&self, entity: Tag) -> Result<String, TitleLookupError>;
}

impl TitleLookup for HashMap<Tag, String> {
    fn title(&self, entity: Tag) -> Result<String, TitleLookupError> {
        self.get(&entity).cloned().ok_or(TitleLookupError::NotFound(entity))
    }
}

/// Nenhum título disponível: toda busca falha e é ignorada.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTitles;

impl TitleLookup for NoTitles {
    fn title(&self, entity: Tag) -> Result<String, TitleLookupError> {
        Err(TitleLookupError::NotFound(entity))
    }
}

/// Resultado do passo 1 para um grupo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResolution {
    /// Bold vencedor do grupo, usado para recuperar o span.
    pub bold: String,
    pub entity: Tag,
    /// Menor distância entre o bold vencedor e o título da entidade.
    pub distance: f64,
}

/// Candidato ranqueado do passo 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub distance: f64,
    /// Palavra da consulta casada com cada palavra do bold.
    pub matched_tokens: Vec<String>,
    pub entity: Tag,
}

/// Uma consulta com seus grupos, para processamento em lote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBackRequest {
    pub query: String,
    pub groups: Vec<(BoldGroup, Tag)>,
}

/// Resolvedor de link-back.
///
/// Não guarda estado entre chamadas: pode ser usado por várias threads ao mesmo
/// tempo desde que o `TitleLookup` também possa.
pub struct LinkBackResolver<L> {
    titles: L,
    config: ResolverConfig,
}

impl<L: TitleLookup> LinkBackResolver<L> {
    pub fn new(titles: L) -> Self {
        Self::with_config(titles, ResolverConfig::default())
    }

    pub fn with_config(titles: L, config: ResolverConfig) -> Self {
        Self { titles, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Passo 1: um bold vencedor por grupo, aplicando a política de colisão
    /// quando dois grupos escolhem o mesmo bold.
    ///
    /// A ordem do resultado é a ordem de primeira aparição de cada bold.
    pub fn resolve_groups(&self, query: &str, groups: &[(BoldGroup, Tag)]) -> Vec<GroupResolution> {
        let query_tokens = tokenize(query);
        let mut resolutions: Vec<GroupResolution> = Vec::with_capacity(groups.len());
        let mut slots: HashMap<String, usize> = HashMap::new();

        for (group, entity) in groups {
            let Some(resolution) = self.resolve_group(&query_tokens, group, *entity) else {
                debug!("Grupo vazio para a entidade {} ignorado", entity);
                continue;
            };

            match slots.get(&resolution.bold).copied() {
                Some(slot) => {
                    let replace = match self.config.collision_policy {
                        CollisionPolicy::LastWriteWins => true,
                        CollisionPolicy::BestDistanceWins => resolution.distance < resolutions[slot].distance,
                    };
                    debug!(
                        "Bold '{}' escolhido pelas entidades {} e {}; vence {}",
                        resolution.bold,
                        resolutions[slot].entity,
                        resolution.entity,
                        if replace { resolution.entity } else { resolutions[slot].entity }
                    );
                    if replace {
                        resolutions[slot] = resolution;
                    }
                }
                None => {
                    slots.insert(resolution.bold.clone(), resolutions.len());
                    resolutions.push(resolution);
                }
            }
        }

        resolutions
    }

    fn resolve_group(&self, query_tokens: &[String], group: &BoldGroup, entity: Tag) -> Option<GroupResolution> {
        let mut best: Option<(&String, f64)> = None;
        for bold in &group.bolds {
            let dist = min_edit_match_tokens(query_tokens, &tokenize(bold)).distance;
            // Empate: fica o primeiro bold do grupo
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((bold, dist));
            }
        }
        let (bold, mut distance) = best?;

        let title_distance = match self.titles.title(entity) {
            Ok(title) => min_edit_match_tokens(query_tokens, &tokenize(&title)).distance,
            Err(TitleLookupError::NotFound(_)) => {
                debug!("Sem título para a entidade {}", entity);
                1.0
            }
            Err(e) => {
                warn!("Falha ao buscar título da entidade {}: {}", entity, e);
                1.0
            }
        };
        if title_distance < distance {
            distance = title_distance;
        }

        Some(GroupResolution {
            bold: bold.clone(),
            entity,
            distance,
        })
    }

    /// Passos 2 e 3: candidatos ordenados por distância crescente (ordenação estável).
    pub fn rank_candidates(&self, query: &str, resolutions: &[GroupResolution]) -> Vec<Candidate> {
        let query_tokens = tokenize(query);
        let mut candidates: Vec<Candidate> = resolutions
            .iter()
            .map(|r| {
                let m = min_edit_match_tokens(&query_tokens, &tokenize(&r.bold));
                Candidate {
                    distance: m.distance,
                    matched_tokens: m.matched_tokens,
                    entity: r.entity,
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates
    }

    /// Produz as anotações disjuntas de `query` a partir dos grupos de bolds.
    ///
    /// A ordem do resultado segue o ranking dos candidatos, não a posição no texto.
    pub fn link_back(&self, query: &str, groups: &[(BoldGroup, Tag)]) -> Vec<ScoredAnnotation> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() || groups.is_empty() {
            return Vec::new();
        }

        let resolutions = self.resolve_groups(query, groups);
        let candidates = self.rank_candidates(query, &resolutions);
        cover(&tokens, &candidates)
    }
}

impl<L: TitleLookup + Sync> LinkBackResolver<L> {
    /// Resolve várias consultas independentes em paralelo.
    pub fn link_back_batch(&self, requests: &[LinkBackRequest]) -> Vec<Vec<ScoredAnnotation>> {
        requests
            .par_iter()
            .map(|r| self.link_back(&r.query, &r.groups))
            .collect()
    }
}

/// Passo 4: cobertura gulosa das palavras da consulta.
///
/// Um span nunca atravessa uma palavra já coberta: se as palavras casadas por um
/// candidato estão separadas por uma palavra coberta antes, o span para na
/// primeira sequência contígua.
fn cover(tokens: &[Token], candidates: &[Candidate]) -> Vec<ScoredAnnotation> {
    let mut to_cover: BTreeSet<usize> = (0..tokens.len()).collect();
    let mut result = Vec::new();

    for cand in candidates {
        if to_cover.is_empty() {
            break;
        }

        let mut hits: Vec<usize> = cand
            .matched_tokens
            .iter()
            .filter_map(|m| tokens.iter().position(|t| t.text == *m))
            .filter(|i| to_cover.contains(i))
            .collect();
        if hits.is_empty() {
            continue;
        }
        hits.sort_unstable();
        hits.dedup();

        let min_pos = hits[0];
        let mut max_pos = min_pos;
        for &i in &hits[1..] {
            if (max_pos + 1..=i).all(|j| to_cover.contains(&j)) {
                max_pos = i;
            } else {
                break;
            }
        }

        for j in min_pos..=max_pos {
            to_cover.remove(&j);
        }
        let start = tokens[min_pos].start;
        let end = tokens[max_pos].end;
        debug!("Entidade {} cobre tokens {}..={} (dist {:.3})", cand.entity, min_pos, max_pos, cand.distance);
        result.push(ScoredAnnotation::new(
            Mention::new(start, end - start),
            cand.entity,
            LINKBACK_SCORE,
        ));
    }

    result
}
