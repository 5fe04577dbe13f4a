//! Erros tipados do crate.

use thiserror::Error;

use crate::annotation::Tag;

/// Falhas do cache persistente de respostas.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("falha de I/O no arquivo de cache: {0}")]
    Io(#[from] std::io::Error),

    #[error("falha ao serializar o cache: {0}")]
    Encode(String),

    #[error("arquivo de cache corrompido: {0}")]
    Decode(String),

    #[error("falha ao comprimir resposta: {0}")]
    Compression(String),
}

/// Falhas do transporte HTTP até o serviço remoto.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("falha ao construir o cliente HTTP: {0}")]
    Build(String),

    #[error("falha na requisição HTTP: {0}")]
    Http(String),
}

/// Falhas de uma requisição ao anotador remoto, vistas por quem chamou.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Nenhuma resposta foi obtida dentro do orçamento de tentativas.
    #[error("nenhuma resposta do anotador após {attempts} tentativas: {message}")]
    NoResponse { attempts: u32, message: String },

    /// Uma resposta foi obtida, mas não é JSON válido ou não tem os campos esperados.
    #[error("resposta do anotador ilegível: {0}")]
    Unparsable(String),

    #[error("endpoint inválido: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Falha ao buscar o título canônico de uma entidade.
#[derive(Debug, Error)]
pub enum TitleLookupError {
    #[error("título não encontrado para a entidade {0}")]
    NotFound(Tag),

    #[error("falha de I/O ao buscar título: {0}")]
    Io(String),
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;
