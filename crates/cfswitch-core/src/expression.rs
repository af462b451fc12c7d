// ── Filter expression builder ──
//
// Hostname normalization and the Cloudflare filter expression derived from
// it. Everything here is pure and total.

use std::collections::BTreeSet;

/// Build the rule expression for `hostnames`, preserving input order.
///
/// An empty list yields `"false"`, which matches nothing.
///
/// ```
/// use cfswitch_core::build_expression;
///
/// assert_eq!(build_expression::<&str>(&[]), "false");
/// assert_eq!(
///     build_expression(&["b.com", "a.com"]),
///     r#"http.host in {"b.com" "a.com"}"#
/// );
/// ```
pub fn build_expression<S: AsRef<str>>(hostnames: &[S]) -> String {
    if hostnames.is_empty() {
        return "false".to_owned();
    }
    let quoted = hostnames
        .iter()
        .map(|h| format!("\"{}\"", h.as_ref()))
        .collect::<Vec<_>>()
        .join(" ");
    format!("http.host in {{{quoted}}}")
}

/// Normalize a list of hostname entries.
///
/// Each entry may itself be a comma-separated list. Parts are trimmed and
/// lowercased; empties are dropped; the result is deduplicated and sorted.
pub fn normalize_hostnames<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .flat_map(|item| {
            item.as_ref()
                .split(',')
                .map(|part| part.trim().to_lowercase())
                .collect::<Vec<_>>()
        })
        .filter(|h| !h.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse the comma-separated form used in configuration.
pub fn parse_hostnames(raw: &str) -> Vec<String> {
    normalize_hostnames([raw])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_expression_matches_nothing() {
        assert_eq!(build_expression::<String>(&[]), "false");
    }

    #[test]
    fn expression_keeps_input_order() {
        assert_eq!(
            build_expression(&["b.com", "a.com"]),
            r#"http.host in {"b.com" "a.com"}"#
        );
        assert_eq!(build_expression(&["x.io"]), r#"http.host in {"x.io"}"#);
    }

    #[test]
    fn normalize_trims_lowercases_dedupes_sorts() {
        let got = normalize_hostnames([" B.com", "a.COM ", "b.com", "", "  ", "c.com"]);
        assert_eq!(got, vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn normalize_splits_commas_inside_entries() {
        let got = normalize_hostnames(["a.com, B.com", "c.com,,", ",a.com"]);
        assert_eq!(got, vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs: &[&[&str]] = &[
            &["Z.com", "a.com", "a.com "],
            &["", ",", " , "],
            &["one.example, TWO.example", "three.example"],
            &[],
        ];
        for input in inputs {
            let once = normalize_hostnames(input.iter());
            let twice = normalize_hostnames(&once);
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn parse_config_string() {
        assert_eq!(
            parse_hostnames("Example.com, test.com ,example.com"),
            vec!["example.com", "test.com"]
        );
        assert!(parse_hostnames(" , ").is_empty());
    }
}
