//! # Tokenizador da Consulta
//!
//! Divide o texto em palavras minúsculas e, para a consulta original, liga cada
//! palavra à sua posição no texto cru.
//!
//! ## Regra de Tokenização
//!
//! 1. Toda sequência maximal de caracteres não-palavra (`\W+`) vira um espaço.
//! 2. O texto é convertido para minúsculas.
//! 3. Divide por espaços em branco, descartando tokens vazios.
//!
//! Não há stemming nem tratamento de abreviações: o objetivo é uma seleção de spans
//! determinística e reprodutível, não correção linguística.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use linkback_core::tokenizer::{tokenize, tokenize_query};
//!
//! assert_eq!(tokenize("New-York, City!"), vec!["new", "york", "city"]);
//!
//! let tokens = tokenize_query("Paris, paris");
//! assert_eq!(tokens[0].start, 0);
//! assert_eq!(tokens[1].start, 7);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("regex \\W+ válida"));

/// Uma palavra da consulta ligada à sua posição no texto original.
///
/// `start` e `end` são offsets em caracteres do texto cru (não do texto minúsculo),
/// de modo que `[start, end)` pode ser usado diretamente como [`crate::Mention`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// Texto do token, já em minúsculas.
    pub text: String,
    /// Offset inicial (inclusivo) em caracteres.
    pub start: usize,
    /// Offset final (exclusivo) em caracteres.
    pub end: usize,
    /// Índice sequencial do token na consulta (0, 1, 2...).
    pub index: usize,
}

/// Converte para minúsculas caractere a caractere.
///
/// Diferente de `str::to_lowercase`, não aplica regras dependentes de contexto
/// (ex: sigma final), então cada caractere do original corresponde a um trecho
/// contíguo do resultado.
pub fn lowercase(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Tokeniza um texto em palavras minúsculas, preservando a ordem.
pub fn tokenize(text: &str) -> Vec<String> {
    let spaced = NON_WORD.replace_all(text, " ");
    lowercase(&spaced)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Texto em minúsculas com o mapa de volta para os caracteres do original.
struct LoweredText {
    text: String,
    /// Para cada byte de `text`, o índice do caractere original que o gerou.
    origin: Vec<usize>,
}

impl LoweredText {
    fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut origin = Vec::with_capacity(original.len());
        for (char_idx, ch) in original.chars().enumerate() {
            for lower in ch.to_lowercase() {
                text.push(lower);
                origin.extend(std::iter::repeat(char_idx).take(lower.len_utf8()));
            }
        }
        Self { text, origin }
    }

    fn char_count(&self) -> usize {
        self.origin.last().map(|&c| c + 1).unwrap_or(0)
    }
}

/// Tokeniza a consulta e resolve o offset de cada token.
///
/// Os offsets são encontrados por busca sequencial no texto minúsculo: um cursor
/// avança após cada ocorrência, então palavras repetidas caem em ocorrências
/// sucessivas.
pub fn tokenize_query(query: &str) -> Vec<Token> {
    let lowered = LoweredText::new(query);
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for (index, word) in tokenize(query).into_iter().enumerate() {
        let (start, end) = match lowered.text[cursor..].find(&word) {
            Some(rel) => {
                let first = cursor + rel;
                let last = first + word.len() - 1;
                cursor = first + word.len();
                (lowered.origin[first], lowered.origin[last] + 1)
            }
            None => {
                let start = lowered.origin.get(cursor).copied().unwrap_or(lowered.char_count());
                (start, start + word.chars().count())
            }
        };
        tokens.push(Token {
            text: word,
            start,
            end,
            index,
        });
    }

    tokens
}
