//! Transporte HTTP até o anotador remoto.
//!
//! O cliente só conhece o trait [`Transport`]; a implementação padrão usa o
//! cliente bloqueante do `reqwest`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::TransportError;

/// Resposta crua do serviço: status HTTP e corpo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Envia um `POST` JSON e devolve a resposta, qualquer que seja o status.
pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError>;
}

/// Transporte HTTP bloqueante.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// `read_timeout = None` deixa a leitura sem prazo.
    pub fn new(read_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(read_timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(TransportResponse { status, body })
    }
}
