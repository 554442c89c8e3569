//! SQL quoting helpers.
//!
//! Identifiers (table, schema, and index names) are the only user-supplied
//! strings ever interpolated into query text; everything else travels as a
//! bound parameter. [`quote_ident`] is therefore the sole injection defense
//! and must be applied to every identifier before interpolation.

/// Quote a SQL identifier, doubling any embedded double quote.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string as a SQL literal, doubling any embedded single quote.
///
/// Used for metadata field names that appear inside generated expressions
/// such as `metadata->>'field'` and `jsonb_build_object('field', ...)`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_plain() {
        assert_eq!(quote_ident("documents"), "\"documents\"");
        assert_eq!(quote_ident("my_table"), "\"my_table\"");
    }

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(
            quote_ident("x\"; DROP TABLE users; --"),
            "\"x\"\"; DROP TABLE users; --\""
        );
    }

    #[test]
    fn quote_literal_doubles_embedded_quotes() {
        assert_eq!(quote_literal("key"), "'key'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
