//! # Comparação Aproximada de Textos
//!
//! Distância de edição normalizada entre palavras e a média das distâncias
//! mínimas entre um bold e a consulta. Funções puras, sem estado.
//!
//! ## Métrica
//!
//! Para cada palavra do **bold**, procura-se a palavra da **consulta** com menor
//! distância de Levenshtein normalizada pelo maior comprimento. O resultado é a
//! média dessas distâncias mínimas.
//!
//! A métrica é assimétrica: mede o quanto cada palavra do bold é
//! explicada por *alguma* palavra da consulta, e não o contrário.
//!
//! ```rust
//! use linkback_core::text_match::{min_edit_dist, norm_edit_distance};
//!
//! assert_eq!(norm_edit_distance("paris", "paris"), 0.0);
//! assert_eq!(min_edit_dist("barack obama visited paris", "Obama"), 0.0);
//! assert_eq!(min_edit_dist("new york", ""), 1.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::tokenizer::tokenize;

/// Distância de Levenshtein dividida por `max(len(a), len(b))`, em `[0, 1]`.
///
/// Comprimentos contados em caracteres. Retorna `1.0` se qualquer uma das strings
/// for vazia.
pub fn norm_edit_distance(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let lev = strsim::levenshtein(a, b);
    let longest = a.chars().count().max(b.chars().count());
    lev as f64 / longest as f64
}

/// Resultado de [`min_edit_match`]: a distância média e a palavra da consulta
/// escolhida para cada palavra do bold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinEditMatch {
    pub distance: f64,
    /// Uma entrada por palavra do bold, na mesma ordem. Pode conter repetições.
    pub matched_tokens: Vec<String>,
}

impl MinEditMatch {
    fn no_match() -> Self {
        Self {
            distance: 1.0,
            matched_tokens: Vec::new(),
        }
    }
}

/// Média das distâncias mínimas de cada palavra do bold contra a consulta.
pub fn min_edit_dist(query: &str, bold: &str) -> f64 {
    min_edit_match(query, bold).distance
}

/// Como [`min_edit_dist`], mas também devolve as palavras da consulta escolhidas.
///
/// Se qualquer um dos lados não tiver palavras, retorna distância `1.0` e nenhuma
/// palavra escolhida.
pub fn min_edit_match(query: &str, bold: &str) -> MinEditMatch {
    let query_tokens = tokenize(query);
    let bold_tokens = tokenize(bold);
    min_edit_match_tokens(&query_tokens, &bold_tokens)
}

/// Núcleo de [`min_edit_match`] sobre textos já tokenizados.
pub(crate) fn min_edit_match_tokens(query_tokens: &[String], bold_tokens: &[String]) -> MinEditMatch {
    if query_tokens.is_empty() || bold_tokens.is_empty() {
        return MinEditMatch::no_match();
    }

    let mut total = 0.0;
    let mut matched_tokens = Vec::with_capacity(bold_tokens.len());

    for bold_token in bold_tokens {
        let mut best_dist = f64::MAX;
        let mut best_token = &query_tokens[0];
        for query_token in query_tokens {
            let dist = norm_edit_distance(bold_token, query_token);
            // Empates ficam com a primeira palavra da consulta
            if dist < best_dist {
                best_dist = dist;
                best_token = query_token;
            }
        }
        matched_tokens.push(best_token.clone());
        total += best_dist;
    }

    MinEditMatch {
        distance: total / bold_tokens.len() as f64,
        matched_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_norm_edit_distance_basic() {
        assert_eq!(norm_edit_distance("kitten", "sitting"), 3.0 / 7.0);
        assert_eq!(norm_edit_distance("abc", "xyz"), 1.0);
        assert_eq!(norm_edit_distance("", "abc"), 1.0);
        assert_eq!(norm_edit_distance("abc", ""), 1.0);
    }

    #[test]
    fn test_norm_edit_distance_counts_chars() {
        // "são" vs "sao": uma substituição em três caracteres
        assert!((norm_edit_distance("são", "sao") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_edit_dist_empty_sides() {
        assert_eq!(min_edit_dist("new york city", ""), 1.0);
        assert_eq!(min_edit_dist("", "new york"), 1.0);
        assert_eq!(min_edit_dist("new york", "!!!"), 1.0);
    }

    #[test]
    fn test_min_edit_match_picks_closest_query_token() {
        let m = min_edit_match("barack obama visited paris", "Obamma");
        assert_eq!(m.matched_tokens, vec!["obama"]);
        assert!((m.distance - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_edit_match_averages_over_bold_tokens() {
        let m = min_edit_match("new york city", "New York Times");
        assert_eq!(m.matched_tokens.len(), 3);
        assert_eq!(&m.matched_tokens[..2], &["new".to_string(), "york".to_string()]);
        let times = ["new", "york", "city"]
            .iter()
            .map(|q| norm_edit_distance("times", q))
            .fold(f64::MAX, f64::min);
        let expected = (0.0 + 0.0 + times) / 3.0;
        assert!((m.distance - expected).abs() < 1e-12);
    }

    #[test]
    fn test_min_edit_match_allows_duplicates() {
        let m = min_edit_match("paris", "paris paris");
        assert_eq!(m.matched_tokens, vec!["paris", "paris"]);
        assert_eq!(m.distance, 0.0);
    }

    #[test]
    fn test_ties_keep_first_query_token() {
        // "ab" está a distância 0.5 de "aa" e de "bb"
        let m = min_edit_match("aa bb", "ab");
        assert_eq!(m.matched_tokens, vec!["aa"]);
    }

    #[test]
    fn test_asymmetry() {
        let q = "barack obama visited paris";
        assert_eq!(min_edit_dist(q, "obama"), 0.0);
        assert!(min_edit_dist("obama", q) > 0.0);
    }

    proptest! {
        #[test]
        fn prop_identity_is_zero(a in "[a-z]{1,12}") {
            prop_assert_eq!(norm_edit_distance(&a, &a), 0.0);
        }

        #[test]
        fn prop_bounded_and_symmetric(a in "\\PC{1,10}", b in "\\PC{1,10}") {
            let ab = norm_edit_distance(&a, &b);
            let ba = norm_edit_distance(&b, &a);
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn prop_min_edit_dist_in_unit_interval(q in "[a-z ]{0,30}", b in "[a-z ]{0,20}") {
            let d = min_edit_dist(&q, &b);
            prop_assert!((0.0..=1.0).contains(&d));
        }

        #[test]
        fn prop_one_match_per_bold_token(q in "[a-z]{1,6}( [a-z]{1,6}){0,4}", b in "[a-z]{1,6}( [a-z]{1,6}){0,3}") {
            let m = min_edit_match(&q, &b);
            prop_assert_eq!(m.matched_tokens.len(), tokenize(&b).len());
        }
    }
}
