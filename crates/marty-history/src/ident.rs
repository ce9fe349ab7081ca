use marty_error::HistoryError;

/// Quotes `name` as a Postgres identifier, doubling embedded quotes.
///
/// Internal names are always derived by this workspace (never taken
/// verbatim from the source), but DDL can't parameterise object names, so
/// every name that ends up interpolated into SQL text still goes through
/// here and is rejected if it contains control characters.
pub fn quote_ident(name: &str) -> Result<String, HistoryError> {
    if name.is_empty() || name.chars().any(|c| c.is_control()) {
        return Err(HistoryError::UnsafeIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quotes_and_doubles_embedded_quotes() {
        assert_eq!(quote_ident("data_s_t_1").unwrap(), "\"data_s_t_1\"");
        assert_eq!(quote_ident("weird\"name").unwrap(), "\"weird\"\"name\"");
    }

    #[test]
    fn rejects_empty_and_control_characters() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("bad\nname").is_err());
        assert!(quote_ident("bad\tname").is_err());
    }
}
