//! Rewrites quoted column references into placeholder identifiers.
//!
//! `"Sales" * 2 + "Sales Tax"` becomes `COLUMN0 * 2 + COLUMN1` together with the association
//! `[("COLUMN0", "Sales"), ("COLUMN1", "Sales Tax")]`. Column names can contain anything,
//! including spaces and operators, so they cannot appear in the compiled formula directly.
use crate::error::{ComputeError, ComputeResult};
use crate::parser::{is_ident_part, is_ident_start};
use formula_table::Schema;

/// Prefix of every generated placeholder. It is not a reserved word, and no built-in function
/// uses it.
pub const PLACEHOLDER_PREFIX: &str = "COLUMN";

/// Output of [`resolve_columns`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFormula {
    /// The formula as the user typed it.
    pub expression: String,
    /// The formula with every column reference replaced by its placeholder.
    pub parsed_expression: String,
    /// `(placeholder, column name)` in order of first appearance.
    pub column_ids: Vec<(String, String)>,
}

pub fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}")
}

/// Whether `ident` has the exact shape of a generated placeholder (`COLUMN` followed by digits).
pub fn is_placeholder(ident: &str) -> bool {
    ident
        .strip_prefix(PLACEHOLDER_PREFIX)
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub fn resolve_columns(formula: &str, schema: &Schema) -> ComputeResult<ResolvedFormula> {
    let mut out = String::with_capacity(formula.len() + 8);
    let mut column_ids: Vec<(String, String)> = Vec::new();
    let mut chars = formula.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\'' => {
                // String literals are copied through untouched, quotes and escapes included.
                out.push('\'');
                loop {
                    match chars.next() {
                        None => {
                            return Err(ComputeError::compile(
                                format!("unterminated string literal at offset {offset}"),
                                formula,
                            ))
                        }
                        Some((_, '\'')) => {
                            out.push('\'');
                            if chars.next_if(|&(_, c)| c == '\'').is_some() {
                                out.push('\'');
                                continue;
                            }
                            break;
                        }
                        Some((_, c)) => out.push(c),
                    }
                }
            }
            '"' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(ComputeError::compile(
                                format!("unterminated column reference at offset {offset}"),
                                formula,
                            ))
                        }
                        Some((_, '"')) => {
                            // `""` is an escaped quote inside the column name.
                            if chars.next_if(|&(_, c)| c == '"').is_some() {
                                name.push('"');
                                continue;
                            }
                            break;
                        }
                        Some((_, c)) => name.push(c),
                    }
                }

                if !schema.contains(&name) {
                    return Err(ComputeError::Reference {
                        column: name,
                        formula: formula.to_string(),
                    });
                }

                let id = match column_ids.iter().find(|(_, column)| *column == name) {
                    Some((id, _)) => id.clone(),
                    None => {
                        let id = placeholder(column_ids.len());
                        column_ids.push((id.clone(), name));
                        id
                    }
                };

                // Keep the placeholder from fusing with a neighbouring identifier or number.
                if out.chars().next_back().is_some_and(is_ident_part) {
                    out.push(' ');
                }
                out.push_str(&id);
                if chars.peek().is_some_and(|&(_, c)| is_ident_part(c)) {
                    out.push(' ');
                }
            }
            c if is_ident_start(c) && !out.chars().next_back().is_some_and(is_ident_part) => {
                let mut word = String::from(c);
                while let Some((_, next)) = chars.next_if(|&(_, c)| is_ident_part(c)) {
                    word.push(next);
                }
                if is_placeholder(&word) {
                    return Err(ComputeError::compile(
                        format!(
                            "identifier {word} at offset {offset} is reserved for column references; quote the column name instead"
                        ),
                        formula,
                    ));
                }
                out.push_str(&word);
            }
            c => out.push(c),
        }
    }

    Ok(ResolvedFormula {
        expression: formula.to_string(),
        parsed_expression: out,
        column_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_table::{ColumnSchema, ScalarKind};
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("a", ScalarKind::Int),
            ColumnSchema::new("b", ScalarKind::Int),
            ColumnSchema::new("Sales Tax", ScalarKind::Float),
            ColumnSchema::new("say \"hi\"", ScalarKind::Str),
        ])
        .unwrap()
    }

    fn ids(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn repeated_references_share_a_placeholder() {
        let resolved = resolve_columns(r#""a" + "b" * "a""#, &schema()).unwrap();
        assert_eq!(resolved.parsed_expression, "COLUMN0 + COLUMN1 * COLUMN0");
        assert_eq!(
            resolved.column_ids,
            ids(&[("COLUMN0", "a"), ("COLUMN1", "b")])
        );
        assert_eq!(resolved.expression, r#""a" + "b" * "a""#);
    }

    #[test]
    fn names_with_spaces_and_escaped_quotes() {
        let resolved =
            resolve_columns(r#"upper("say ""hi""") + "Sales Tax""#, &schema()).unwrap();
        assert_eq!(resolved.parsed_expression, "upper(COLUMN0) + COLUMN1");
        assert_eq!(
            resolved.column_ids,
            ids(&[("COLUMN0", "say \"hi\""), ("COLUMN1", "Sales Tax")])
        );
    }

    #[test]
    fn string_literals_are_not_column_references() {
        let resolved = resolve_columns(r#"concat('"a" ''x''', "b")"#, &schema()).unwrap();
        assert_eq!(resolved.parsed_expression, r#"concat('"a" ''x''', COLUMN0)"#);
        assert_eq!(resolved.column_ids, ids(&[("COLUMN0", "b")]));
    }

    #[test]
    fn placeholders_do_not_fuse_with_neighbours() {
        let resolved = resolve_columns(r#"2"a""b"x"#, &schema());
        // `"a""b"` is a single name containing a quote, which the schema does not have.
        assert!(matches!(resolved, Err(ComputeError::Reference { .. })));

        let resolved = resolve_columns(r#"2"a"x"#, &schema()).unwrap();
        assert_eq!(resolved.parsed_expression, "2 COLUMN0 x");
    }

    #[test]
    fn unknown_columns_are_reference_errors() {
        let err = resolve_columns(r#""a" + "z""#, &schema()).unwrap_err();
        assert_eq!(
            err,
            ComputeError::Reference {
                column: "z".into(),
                formula: r#""a" + "z""#.into(),
            }
        );
    }

    #[test]
    fn unterminated_quotes_are_compile_errors() {
        assert!(matches!(
            resolve_columns(r#""a"#, &schema()),
            Err(ComputeError::Compile { .. })
        ));
        assert!(matches!(
            resolve_columns("'abc", &schema()),
            Err(ComputeError::Compile { .. })
        ));
    }

    #[test]
    fn bare_placeholder_identifiers_are_rejected() {
        let err = resolve_columns(r#""a" + COLUMN0"#, &schema()).unwrap_err();
        assert!(err.to_string().contains("reserved for column references"), "{err}");

        // Only the exact placeholder shape is reserved.
        let ok = resolve_columns("COLUMNS + column0 + XCOLUMN0", &schema()).unwrap();
        assert!(ok.column_ids.is_empty());
    }

    #[test]
    fn formulas_without_references_pass_through() {
        let resolved = resolve_columns("1 + 2", &schema()).unwrap();
        assert_eq!(resolved.parsed_expression, "1 + 2");
        assert!(resolved.column_ids.is_empty());
    }
}
