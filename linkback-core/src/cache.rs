//! # Cache Persistente de Respostas
//!
//! Mapa `chave da requisição -> resposta comprimida (gzip)`, compartilhado por todos
//! os clientes do processo via `Arc<AnnotationCache>`.
//!
//! ## Ciclo de Vida
//!
//! 1. [`AnnotationCache::open`] carrega o arquivo inteiro, se existir.
//! 2. Cada [`AnnotationCache::put`] incrementa um contador; a cada `flush_every`
//!    escritas o mapa inteiro é regravado em disco.
//! 3. [`AnnotationCache::flush`] força a gravação.
//! 4. Ao sair de escopo (`Drop`), escritas pendentes são gravadas.
//!
//! Uma entrada nunca expira: um hit é sempre autoritativo.
//!
//! ## Concorrência
//!
//! Um único `Mutex` protege mapa, contador e caminho: leitura, escrita e flush
//! são serializados, então um flush nunca observa o mapa pela metade.
//!
//! ## Formato em Disco
//!
//! `bincode` de um `HashMap<String, Vec<u8>>`, escrito num arquivo temporário no
//! mesmo diretório e renomeado sobre o destino.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Vec<u8>>,
    path: Option<PathBuf>,
    /// Escritas desde a criação (dispara o flush periódico).
    writes: u64,
    /// Há escritas ainda não gravadas em disco.
    dirty: bool,
}

/// Cache de respostas do anotador remoto.
#[derive(Debug)]
pub struct AnnotationCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl AnnotationCache {
    /// Cache apenas em memória (nada é gravado até [`Self::set_path`]).
    pub fn in_memory() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            config,
        }
    }

    /// Abre o cache ligado a `path`, carregando o conteúdo existente.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::open_with_config(path, CacheConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self, CacheError> {
        let cache = Self::with_config(config);
        cache.set_path(path)?;
        Ok(cache)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Liga o cache a um arquivo e carrega o mapa persistido.
    ///
    /// Chamar de novo com o mesmo caminho não faz nada. Se o arquivo não existir,
    /// o mapa em memória é mantido.
    pub fn set_path(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref();
        let mut state = self.lock();
        if state.path.as_deref() == Some(path) {
            return Ok(());
        }

        if path.exists() {
            info!("Carregando cache de respostas de {}", path.display());
            state.entries = read_entries(path)?;
            info!("Cache carregado: {} entradas", state.entries.len());
        }
        state.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Descarta o mapa em memória. O caminho continua configurado.
    pub fn unset(&self) {
        let mut state = self.lock();
        state.entries = HashMap::new();
        state.dirty = false;
    }

    /// Resposta descomprimida para `key`.
    ///
    /// Uma entrada que não descomprime é tratada como ausente.
    pub fn get(&self, key: &str) -> Option<String> {
        let compressed = {
            let state = self.lock();
            state.entries.get(key)?.clone()
        };
        match decompress(&compressed) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Entrada de cache ilegível, tratando como miss: {}", e);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Comprime e guarda `value`, gravando em disco a cada `flush_every` escritas.
    pub fn put(&self, key: impl Into<String>, value: &str) -> Result<(), CacheError> {
        let compressed = compress(value)?;
        let mut state = self.lock();
        state.entries.insert(key.into(), compressed);
        state.writes += 1;
        state.dirty = true;
        if self.config.flush_every > 0 && state.writes % self.config.flush_every == 0 {
            persist(&mut state)?;
        }
        Ok(())
    }

    /// Grava o mapa inteiro em disco, independente do contador.
    pub fn flush(&self) -> Result<(), CacheError> {
        let mut state = self.lock();
        persist(&mut state)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.lock().entries.insert(key.to_string(), bytes);
    }
}

impl Drop for AnnotationCache {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.dirty {
            if let Err(e) = persist(state) {
                error!("Falha ao gravar cache ao encerrar: {}", e);
            }
        }
    }
}

fn persist(state: &mut CacheState) -> Result<(), CacheError> {
    let Some(path) = state.path.clone() else {
        return Ok(());
    };
    info!("Gravando cache de respostas ({} entradas)...", state.entries.len());
    write_entries(&path, &state.entries)?;
    state.dirty = false;
    debug!("Cache gravado em {}", path.display());
    Ok(())
}

fn read_entries(path: &Path) -> Result<HashMap<String, Vec<u8>>, CacheError> {
    let reader = BufReader::new(File::open(path)?);
    bincode::deserialize_from(reader).map_err(|e| CacheError::Decode(e.to_string()))
}

fn write_entries(path: &Path, entries: &HashMap<String, Vec<u8>>) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut writer, entries).map_err(|e| CacheError::Encode(e.to_string()))?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

/// Comprime um texto com gzip.
pub fn compress(text: &str) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .and_then(|_| encoder.finish())
        .map_err(|e| CacheError::Compression(e.to_string()))
}

/// Descomprime um texto gzip.
pub fn decompress(bytes: &[u8]) -> Result<String, CacheError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| CacheError::Decode(e.to_string()))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let cache = AnnotationCache::in_memory();
        let body = r#"{"annotations":[],"time":{"total":12}}"#;
        cache.put("k", body).unwrap();
        assert_eq!(cache.get("k").as_deref(), Some(body));
        assert_eq!(cache.get("outra"), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let cache = AnnotationCache::in_memory();
        cache.insert_raw("k", vec![1, 2, 3, 4]);
        assert!(cache.contains("k"));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wat.cache");

        let cache = AnnotationCache::open(&path).unwrap();
        cache.put("a", "resposta a").unwrap();
        cache.put("b", "resposta b").unwrap();
        cache.flush().unwrap();
        assert!(path.exists());

        let reloaded = AnnotationCache::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("b").as_deref(), Some("resposta b"));
    }

    #[test]
    fn test_periodic_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wat.cache");
        let cache = AnnotationCache::open_with_config(&path, CacheConfig { flush_every: 3 }).unwrap();

        cache.put("1", "x").unwrap();
        cache.put("2", "x").unwrap();
        assert!(!path.exists());
        cache.put("3", "x").unwrap();
        assert!(path.exists());
        assert_eq!(read_entries(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_drop_flushes_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wat.cache");
        {
            let cache = AnnotationCache::open(&path).unwrap();
            cache.put("k", "v").unwrap();
        }
        let reloaded = AnnotationCache::open(&path).unwrap();
        assert_eq!(reloaded.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_set_path_same_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wat.cache");
        let cache = AnnotationCache::open(&path).unwrap();
        cache.put("k", "v").unwrap();
        cache.set_path(&path).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unset_discards_memory() {
        let cache = AnnotationCache::in_memory();
        cache.put("k", "v").unwrap();
        cache.unset();
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_failed_flush_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ausente").join("wat.cache");
        let cache = AnnotationCache::open(&path).unwrap();
        cache.put("k", "v").unwrap();
        assert!(matches!(cache.flush(), Err(CacheError::Io(_))));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert!(!path.exists());
        cache.unset();
    }

    #[test]
    fn test_concurrent_puts_with_periodic_flush() {
        use std::sync::Arc;
        use std::thread;

        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;
        const SHARED: usize = 3;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wat.cache");
        let cache = Arc::new(AnnotationCache::open_with_config(&path, CacheConfig { flush_every: 4 }).unwrap());

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..PER_THREAD {
                        cache.put(format!("t{}-{}", t, j), &format!("valor {} {}", t, j)).unwrap();
                        cache.put(format!("shared-{}", j % SHARED), &format!("t{}", t)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), THREADS * PER_THREAD + SHARED);
        // Houve flushes periódicos durante as escritas
        assert!(path.exists());
        assert!(read_entries(&path).is_ok());

        cache.flush().unwrap();
        let on_disk = read_entries(&path).unwrap();
        assert_eq!(on_disk.len(), THREADS * PER_THREAD + SHARED);
        for t in 0..THREADS {
            for j in 0..PER_THREAD {
                let stored = decompress(&on_disk[&format!("t{}-{}", t, j)]).unwrap();
                assert_eq!(stored, format!("valor {} {}", t, j));
            }
        }

        let writers: Vec<String> = (0..THREADS).map(|t| format!("t{}", t)).collect();
        for k in 0..SHARED {
            let value = cache.get(&format!("shared-{}", k)).unwrap();
            assert!(writers.contains(&value), "valor inesperado: {}", value);
        }
    }
}
