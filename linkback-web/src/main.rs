//! Servidor web Axum para link-back de bolds e anotação via serviço remoto

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use linkback_core::{
    AnnotationCache, AnnotationError, BoldGroup, ClientConfig, CollisionPolicy, LinkBackResolver,
    RemoteAnnotationClient, ResolverConfig, ScoredAnnotation, Tag,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Configuração do servidor lida do ambiente
#[derive(Debug, Clone)]
struct ServerConfig {
    addr: SocketAddr,
    annotator: Option<ClientConfig>,
    cache_path: Option<String>,
}

impl ServerConfig {
    fn from_env() -> Self {
        let addr = std::env::var("LINKBACK_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let annotator = std::env::var("LINKBACK_ANNOTATOR_HOST").ok().map(|host| {
            let port = std::env::var("LINKBACK_ANNOTATOR_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080);
            let read_timeout = std::env::var("LINKBACK_ANNOTATOR_TIMEOUT_MS")
                .ok()
                .and_then(|t| t.parse().ok())
                .map(Duration::from_millis);
            ClientConfig {
                read_timeout,
                ..ClientConfig::new(host, port, "base")
            }
        });

        Self {
            addr,
            annotator,
            cache_path: std::env::var("LINKBACK_CACHE_PATH").ok(),
        }
    }
}

/// Estado compartilhado da aplicação
struct AppState {
    client: Option<Arc<RemoteAnnotationClient>>,
}

#[derive(Deserialize)]
struct GroupDto {
    bolds: Vec<String>,
    entity: i64,
}

#[derive(Deserialize)]
struct LinkBackRequest {
    query: String,
    groups: Vec<GroupDto>,
    #[serde(default)]
    titles: HashMap<i64, String>,
    #[serde(default)]
    policy: Option<CollisionPolicy>,
}

#[derive(Serialize)]
struct AnnotationDto {
    position: usize,
    length: usize,
    entity: Tag,
    score: f32,
    text: String,
}

impl AnnotationDto {
    fn from_annotation(ann: &ScoredAnnotation, text: &str) -> Self {
        Self {
            position: ann.position,
            length: ann.length,
            entity: ann.entity,
            score: ann.score,
            text: ann.mention().slice(text),
        }
    }
}

#[derive(Serialize)]
struct AnnotationsResponse {
    annotations: Vec<AnnotationDto>,
    processing_ms: u64,
}

#[derive(Deserialize)]
struct AnnotateRequest {
    text: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Falha ao abrir {}: {}", config.addr, e);
            return;
        }
    };

    // O cliente HTTP bloqueante não pode ser criado dentro do runtime async
    let client = match config.annotator.clone() {
        Some(annotator) => {
            let cache_path = config.cache_path.clone();
            match tokio::task::spawn_blocking(move || build_client(annotator, cache_path)).await {
                Ok(Ok(client)) => {
                    info!("Anotador remoto configurado: {}", client.name());
                    Some(Arc::new(client))
                }
                Ok(Err(e)) => {
                    error!("Falha ao configurar o anotador remoto: {}", e);
                    None
                }
                Err(e) => {
                    error!("Falha ao configurar o anotador remoto: {}", e);
                    None
                }
            }
        }
        None => {
            info!("LINKBACK_ANNOTATOR_HOST ausente: /annotate desabilitado");
            None
        }
    };

    let state = Arc::new(AppState { client: client.clone() });
    let app = router(state);

    info!("🚀 Servidor de link-back iniciado em http://{}", config.addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Servidor encerrado com erro: {}", e);
    }

    // Grava o cache antes de sair
    if let Some(client) = client {
        let flushed = tokio::task::spawn_blocking(move || {
            let result = client.cache().flush();
            drop(client);
            result
        })
        .await;
        match flushed {
            Ok(Ok(())) => info!("Cache gravado"),
            Ok(Err(e)) => error!("Falha ao gravar o cache: {}", e),
            Err(e) => error!("Falha ao gravar o cache: {}", e),
        }
    }
}

fn build_client(config: ClientConfig, cache_path: Option<String>) -> Result<RemoteAnnotationClient, AnnotationError> {
    let cache = match cache_path {
        Some(path) => AnnotationCache::open(path)?,
        None => AnnotationCache::in_memory(),
    };
    RemoteAnnotationClient::new(config, Arc::new(cache))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Falha ao instalar o handler de Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Encerrando servidor...");
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/link-back", post(link_back_handler))
        .route("/annotate", post(annotate_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

/// Link-back de grupos de bolds sobre a consulta (sem rede)
async fn link_back_handler(Json(req): Json<LinkBackRequest>) -> Response {
    if req.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Consulta vazia");
    }

    let started = Instant::now();
    let titles: HashMap<Tag, String> = req.titles.into_iter().map(|(id, t)| (Tag(id), t)).collect();
    let config = ResolverConfig {
        collision_policy: req.policy.unwrap_or_default(),
    };
    let groups: Vec<(BoldGroup, Tag)> = req
        .groups
        .into_iter()
        .map(|g| (BoldGroup::new(g.bolds), Tag(g.entity)))
        .collect();
    let query = req.query;

    let result = tokio::task::spawn_blocking(move || {
        let resolver = LinkBackResolver::with_config(titles, config);
        let annotations = resolver.link_back(&query, &groups);
        annotations
            .iter()
            .map(|a| AnnotationDto::from_annotation(a, &query))
            .collect::<Vec<_>>()
    })
    .await;

    match result {
        Ok(annotations) => Json(AnnotationsResponse {
            annotations,
            processing_ms: started.elapsed().as_millis() as u64,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Anotação do texto pelo serviço remoto (com cache e retry)
async fn annotate_handler(State(state): State<Arc<AppState>>, Json(req): Json<AnnotateRequest>) -> Response {
    let Some(client) = state.client.clone() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Anotador remoto não configurado");
    };
    if req.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    let started = Instant::now();
    let text = req.text;
    let result = tokio::task::spawn_blocking(move || {
        client.annotate(&text).map(|anns| {
            anns.iter()
                .map(|a| AnnotationDto::from_annotation(a, &text))
                .collect::<Vec<_>>()
        })
    })
    .await;

    match result {
        Ok(Ok(annotations)) => Json(AnnotationsResponse {
            annotations,
            processing_ms: started.elapsed().as_millis() as u64,
        })
        .into_response(),
        Ok(Err(e)) => {
            let status = match e {
                AnnotationError::NoResponse { .. } => StatusCode::BAD_GATEWAY,
                AnnotationError::Unparsable(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(AppState { client: None }))
    }

    async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_link_back_endpoint() {
        let (status, body) = post_json(
            "/link-back",
            serde_json::json!({
                "query": "Barack Obama visited Paris",
                "groups": [{"bolds": ["Obama"], "entity": 1}, {"bolds": ["Paris"], "entity": 2}],
                "titles": {"1": "Barack Obama"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let anns = body["annotations"].as_array().unwrap();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0]["text"], "Obama");
        assert_eq!(anns[1]["entity"], 2);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let (status, _) = post_json("/link-back", serde_json::json!({"query": "  ", "groups": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_annotate_without_annotator() {
        let (status, _) = post_json("/annotate", serde_json::json!({"text": "obama"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
