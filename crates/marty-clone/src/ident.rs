use marty_error::CloneError;

/// Quotes `name` as a Postgres identifier, doubling embedded quotes.
///
/// Every name interpolated into the view/trigger DDL below originates from
/// the history store's own catalog rows, never from user input, but DDL
/// can't parameterise object names so each one is still routed through here.
pub fn quote_ident(name: &str) -> Result<String, CloneError> {
    if name.is_empty() || name.chars().any(|c| c.is_control()) {
        return Err(CloneError::UnsafeIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quotes_and_doubles_embedded_quotes() {
        assert_eq!(quote_ident("orders").unwrap(), "\"orders\"");
        assert_eq!(quote_ident("weird\"name").unwrap(), "\"weird\"\"name\"");
    }

    #[test]
    fn rejects_empty_and_control_characters() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("bad\nname").is_err());
    }
}
