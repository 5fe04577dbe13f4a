//! # linkback-core — Link-back de Bolds e Cliente do Anotador Remoto
//!
//! Este crate liga evidências textuais ("bolds") devolvidas por uma fonte externa
//! de anotação a trechos da consulta original, e oferece o acesso cacheado ao
//! serviço remoto que produz essas anotações.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Tokenização** ([`tokenizer`]): palavras minúsculas com offsets no texto cru.
//! 2.  **Comparação aproximada** ([`text_match`]): distância de edição normalizada por palavra.
//! 3.  **Link-back** ([`linkback`]): escolhe o melhor bold de cada grupo, ranqueia os
//!     candidatos e cobre as palavras da consulta de forma gulosa.
//! 4.  **Anotador remoto** ([`client`]): requisições ao serviço externo com retry e
//!     cache persistente ([`cache`]).
//!
//! O link-back e o cliente são independentes: quem orquestra o sistema interpreta as
//! respostas do serviço e alimenta o resolvedor com os grupos de bolds.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use linkback_core::{BoldGroup, LinkBackResolver, NoTitles, Tag};
//!
//! let resolver = LinkBackResolver::new(NoTitles);
//! let query = "New York City";
//! let groups = vec![(BoldGroup::new(["New York"]), Tag(5))];
//!
//! for ann in resolver.link_back(query, &groups) {
//!     println!("{} -> {} ({:.1})", ann.mention().slice(query), ann.entity, ann.score);
//! }
//! ```

pub mod annotation;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod linkback;
pub mod text_match;
pub mod tokenizer;
pub mod transport;
pub mod wire;

pub use annotation::{BoldGroup, Mention, MultipleAnnotation, ScoredAnnotation, ScoredTag, Tag};
pub use cache::AnnotationCache;
pub use client::{DisambiguationOutcome, Endpoint, RemoteAnnotationClient};
pub use config::{CacheConfig, ClientConfig, CollisionPolicy, ResolverConfig};
pub use error::{AnnotationError, CacheError, TitleLookupError, TransportError};
pub use linkback::{LinkBackRequest, LinkBackResolver, NoTitles, TitleLookup};
pub use text_match::{min_edit_dist, min_edit_match, norm_edit_distance};
