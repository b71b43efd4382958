//! Token substitution.
//!
//! Two literal passes: `{i}` positional tokens against one CSV record, then
//! `{{key}}` dictionary tokens against the active store. Neither pass
//! evaluates anything; unknown tokens pass through untouched.

use crate::error::RenderError;
use crate::store::KeyValueStore;

/// What to do with a `{i}` token whose index is past the end of the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PositionalPolicy {
    /// Leave the token in the output as written.
    #[default]
    Lenient,
    /// Fail with [`RenderError::PositionalOutOfRange`].
    Strict,
}

/// Replace every `{i}` in `row` with `cells[i]` and append a newline.
///
/// A single left-to-right scan, so text coming from a cell is never
/// scanned again. Only canonical indices count as tokens: `{07}` is
/// literal text.
pub fn substitute_positional(
    row: &str,
    cells: &[String],
    policy: PositionalPolicy,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(row.len() + 1);
    let mut rest = row;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
        let canonical = digits == 1 || (digits > 1 && !after.starts_with('0'));

        if !canonical || !after[digits..].starts_with('}') {
            out.push('{');
            rest = after;
            continue;
        }

        let token_len = digits + 2;
        let index = after[..digits].parse::<usize>().unwrap_or(usize::MAX);
        match cells.get(index) {
            Some(cell) => out.push_str(cell),
            None if policy == PositionalPolicy::Strict => {
                return Err(RenderError::PositionalOutOfRange {
                    index,
                    width: cells.len(),
                });
            }
            None => out.push_str(&rest[open..open + token_len]),
        }
        rest = &rest[open + token_len..];
    }

    out.push_str(rest);
    out.push('\n');
    Ok(out)
}

/// Replace `{{key}}` tokens with store values, one store entry at a time
/// in store order.
pub fn substitute_dictionary(text: &str, store: &KeyValueStore) -> String {
    let mut out = text.to_string();
    for (key, value) in store.entries() {
        let token = format!("{{{{{}}}}}", key);
        if out.contains(&token) {
            out = out.replace(&token, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn lenient(row: &str, values: &[&str]) -> String {
        substitute_positional(row, &cells(values), PositionalPolicy::Lenient).unwrap()
    }

    #[test]
    fn replaces_positional_tokens() {
        assert_eq!(
            lenient("Hello {0}, you are {1}", &["Alice", "30"]),
            "Hello Alice, you are 30\n"
        );
    }

    #[test]
    fn repeated_and_reordered_tokens() {
        assert_eq!(lenient("{1}-{0}-{1}", &["a", "b"]), "b-a-b\n");
    }

    #[test]
    fn rows_without_tokens_only_gain_a_newline() {
        for row in ["", "plain text", "{ not a token }", "{x}", "{}"] {
            assert_eq!(lenient(row, &["a", "b"]), format!("{}\n", row));
        }
    }

    #[test]
    fn out_of_range_tokens_pass_through() {
        assert_eq!(lenient("{0} {1} {2}", &["only"]), "only {1} {2}\n");
        assert_eq!(lenient("{0}", &[]), "{0}\n");
    }

    #[test]
    fn strict_policy_rejects_out_of_range() {
        let err = substitute_positional("{0} {3}", &cells(&["a", "b"]), PositionalPolicy::Strict)
            .unwrap_err();
        match err {
            RenderError::PositionalOutOfRange { index, width } => {
                assert_eq!(index, 3);
                assert_eq!(width, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn cell_values_are_not_rescanned() {
        assert_eq!(lenient("{0}|{1}", &["{1}", "x"]), "{1}|x\n");
    }

    #[test]
    fn non_canonical_indices_are_literal() {
        assert_eq!(lenient("{00}{01}{10}", &["a", "b"]), "{00}{01}{10}\n");
    }

    #[test]
    fn positional_token_inside_braces() {
        assert_eq!(lenient("{{0}}", &["a"]), "{a}\n");
    }

    #[test]
    fn dictionary_replaces_known_keys() {
        let store = KeyValueStore::from_pairs([("user", "Sam")]);
        assert_eq!(substitute_dictionary("Welcome {{user}}!", &store), "Welcome Sam!");
        assert_eq!(
            substitute_dictionary("{{user}} and {{user}}", &store),
            "Sam and Sam"
        );
    }

    #[test]
    fn dictionary_leaves_unknown_keys() {
        let store = KeyValueStore::from_pairs([("other", "x")]);
        assert_eq!(
            substitute_dictionary("Welcome {{user}}!", &store),
            "Welcome {{user}}!"
        );
        assert_eq!(
            substitute_dictionary("Welcome {{user}}!", &KeyValueStore::new()),
            "Welcome {{user}}!"
        );
    }

    #[test]
    fn dictionary_applies_entries_in_store_order() {
        let store = KeyValueStore::from_pairs([("a", "{{b}}"), ("b", "B")]);
        assert_eq!(substitute_dictionary("{{a}}", &store), "B");

        let store = KeyValueStore::from_pairs([("b", "B"), ("a", "{{b}}")]);
        assert_eq!(substitute_dictionary("{{a}}", &store), "{{b}}");
    }
}
