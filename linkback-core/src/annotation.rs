//! # Modelo de Dados das Anotações
//!
//! Tipos de valor trocados entre o resolvedor de link-back, o cliente do anotador
//! remoto e quem os consome.
//!
//! | Tipo                 | Significado                                              |
//! |----------------------|----------------------------------------------------------|
//! | [`Tag`]              | Identificador opaco de entidade (id de página)           |
//! | [`Mention`]          | Intervalo semiaberto `[position, position+length)`       |
//! | [`ScoredAnnotation`] | Mention + entidade + score                               |
//! | [`ScoredTag`]        | Entidade + score, sem posição                            |
//! | [`MultipleAnnotation`] | Mention + candidatos ranqueados                        |
//! | [`BoldGroup`]        | Variantes de superfície que apontam para a mesma entidade |
//!
//! As posições são contadas em caracteres (Unicode scalar values) do texto original.

use serde::{Deserialize, Serialize};

/// Identificador de entidade no sistema de origem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub i64);

impl Tag {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Tag {
    fn from(id: i64) -> Self {
        Tag(id)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Um trecho do texto: `[position, position + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    /// Offset do primeiro caractere.
    pub position: usize,
    /// Quantidade de caracteres cobertos.
    pub length: usize,
}

impl Mention {
    pub fn new(position: usize, length: usize) -> Self {
        Self { position, length }
    }

    /// Cria a mention a partir de um par `start..end` (como devolvido pelo serviço remoto).
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self {
            position: start,
            length: end.saturating_sub(start),
        }
    }

    /// Offset exclusivo do fim do trecho.
    pub fn end(&self) -> usize {
        self.position + self.length
    }

    /// Dois trechos se sobrepõem quando compartilham ao menos um caractere.
    pub fn overlaps(&self, other: &Mention) -> bool {
        self.position < other.end() && other.position < self.end()
    }

    /// Recupera o texto coberto pela mention dentro de `text`.
    pub fn slice(&self, text: &str) -> String {
        text.chars().skip(self.position).take(self.length).collect()
    }
}

/// Anotação final: trecho do texto ligado a uma entidade com um score de confiança.
///
/// O score pode ser uma constante (o link-back sempre emite `1.0`) quando a regra
/// que produziu a anotação não tem um score próprio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAnnotation {
    pub position: usize,
    pub length: usize,
    pub entity: Tag,
    pub score: f32,
}

impl ScoredAnnotation {
    pub fn new(mention: Mention, entity: Tag, score: f32) -> Self {
        Self {
            position: mention.position,
            length: mention.length,
            entity,
            score,
        }
    }

    pub fn mention(&self) -> Mention {
        Mention::new(self.position, self.length)
    }
}

/// Entidade com score, sem posição no texto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTag {
    pub entity: Tag,
    pub score: f32,
}

/// Um trecho com a lista ordenada de entidades candidatas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleAnnotation {
    pub mention: Mention,
    /// Candidatos na ordem do ranking devolvido pelo serviço.
    pub candidates: Vec<Tag>,
}

/// Conjunto de strings de superfície ("bolds") que se referem à mesma entidade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoldGroup {
    pub bolds: Vec<String>,
}

impl BoldGroup {
    pub fn new<I, S>(bolds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bolds: bolds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bolds.is_empty()
    }
}
