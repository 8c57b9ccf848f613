// src/text.rs
//! Text normalization shared by host validation and bill-type filtering.
//!
//! Two stages of one pipeline:
//! - `fold`: NFKD decomposition, combining marks dropped, lowercased.
//! - `normalize`: `fold`, then every non-alphanumeric run becomes one space.
//!
//! Page markers are matched on folded text (they may contain markup such as
//! `> SAPL <`); labels and titles are matched on whole words of normalized text.

use once_cell::sync::OnceCell;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Case and diacritic folding, punctuation kept. `"Matéria"` → `"materia"`.
pub fn fold(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Folded lowercase words separated by single spaces.
///
/// `"Matérias Legislativas"` → `"materias legislativas"`,
/// `"SAPL - Interlegis"` → `"sapl interlegis"`.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for ch in fold(s).chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Substring containment after normalizing both sides. An empty needle
/// never matches.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    let needle = normalize(needle);
    !needle.is_empty() && normalize(haystack).contains(&needle)
}

/// Hostname slug for a municipality: diacritics stripped, lowercase, only `[a-z0-9]`.
///
/// `"São João d'Aliança"` → `"saojoaodalianca"`.
pub fn slugify(name: &str) -> String {
    fold(name)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Extract the text of the first `<title>` element, entity-decoded and trimmed.
pub fn html_title(html: &str) -> Option<String> {
    static RE_TITLE: OnceCell<Regex> = OnceCell::new();
    let re = RE_TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").unwrap());
    let raw = re.captures(html)?.get(1)?.as_str();
    let decoded = html_escape::decode_html_entities(raw);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let title = re_ws.replace_all(decoded.trim(), " ").to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Truncate to at most `max` chars without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_diacritics_case_and_punct() {
        assert_eq!(normalize("Matérias Legislativas"), "materias legislativas");
        assert_eq!(normalize("  SAPL - Interlegis!! "), "sapl interlegis");
        assert_eq!(normalize("PL - Projeto de Lei Ordinária"), "pl projeto de lei ordinaria");
        assert_eq!(normalize("> SAPL <"), "sapl");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn fold_keeps_punctuation() {
        assert_eq!(fold("<b>> SAPL <</b>"), "<b>> sapl <</b>");
        assert_eq!(fold("AÇÃO"), "acao");
    }

    #[test]
    fn containment_is_on_normalized_substrings() {
        assert!(contains_normalized("Pesquisar Matéria Legislativa", "pesquisar materia legislativa"));
        assert!(contains_normalized("<h1>Projeto de Lei Complementar</h1>", "projeto de lei"));
        assert!(contains_normalized("Anteprojeto de Lei", "projeto de lei"));
        assert!(contains_normalized("SAPL3 - Câmara", "sapl"));
        assert!(!contains_normalized("projetos de leitura", "projeto de lei"));
        assert!(!contains_normalized("anything", ""));
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("São Paulo"), "saopaulo");
        assert_eq!(slugify("São João d'Aliança"), "saojoaodalianca");
        assert_eq!(slugify("Embu-Guaçu"), "embuguacu");
        assert_eq!(slugify("Itaú de Minas 2"), "itaudeminas2");
    }

    #[test]
    fn title_is_decoded_and_collapsed() {
        let html = "<html><head><TITLE>\n  SAPL &amp;\n Câmara </TITLE></head></html>";
        assert_eq!(html_title(html).as_deref(), Some("SAPL & Câmara"));
        assert_eq!(html_title("<p>no title</p>"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("ação", 2), "aç");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
