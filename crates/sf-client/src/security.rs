//! Escaping and validation for values that end up in SOQL text or URL paths.
//!
//! Every caller-supplied literal that is spliced into a query goes through
//! [`soql::escape_string`]; every identifier goes through
//! [`soql::is_safe_field_name`] or [`soql::is_safe_sobject_name`].
//!
//! ```rust
//! use forcelink_client::security::soql;
//!
//! let name = soql::escape_string("O'Brien");
//! let query = format!("SELECT Id FROM Contact WHERE LastName = '{name}'");
//! assert_eq!(query, "SELECT Id FROM Contact WHERE LastName = 'O\\'Brien'");
//! ```

/// SOQL escaping utilities.
pub mod soql {
    /// Escape a string value for use inside a quoted SOQL literal.
    ///
    /// ```rust
    /// use forcelink_client::security::soql;
    ///
    /// assert_eq!(soql::escape_string("O'Brien & Co."), "O\\'Brien & Co.");
    /// ```
    #[must_use]
    pub fn escape_string(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 16);
        for ch in value.chars() {
            match ch {
                '\'' => escaped.push_str("\\'"),
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// Escape a value for a LIKE pattern where `%` and `_` must match literally.
    #[must_use]
    pub fn escape_like(value: &str) -> String {
        let base_escaped = escape_string(value);
        let mut escaped = String::with_capacity(base_escaped.len() + 8);
        for ch in base_escaped.chars() {
            match ch {
                '%' => escaped.push_str("\\%"),
                '_' => escaped.push_str("\\_"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    fn is_identifier(segment: &str) -> bool {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            }
            _ => false,
        }
    }

    /// Validate a field name, including relationship paths like `Account.Owner.Name`.
    ///
    /// ```rust
    /// use forcelink_client::security::soql;
    ///
    /// assert!(soql::is_safe_field_name("Custom_Field__c"));
    /// assert!(soql::is_safe_field_name("Account.Name"));
    /// assert!(!soql::is_safe_field_name("Bad'; DROP TABLE--"));
    /// assert!(!soql::is_safe_field_name("Account..Name"));
    /// ```
    #[must_use]
    pub fn is_safe_field_name(name: &str) -> bool {
        !name.is_empty() && name.split('.').all(is_identifier)
    }

    /// Validate an SObject API name. Dots are not allowed.
    #[must_use]
    pub fn is_safe_sobject_name(name: &str) -> bool {
        is_identifier(name)
    }
}

/// URL path utilities.
pub mod url {
    /// Percent-encode a single path segment or query value.
    ///
    /// ```rust
    /// use forcelink_client::security::url;
    ///
    /// assert_eq!(url::encode_param("001/../../secret"), "001%2F..%2F..%2Fsecret");
    /// ```
    #[must_use]
    pub fn encode_param(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    /// Salesforce ids are 15 or 18 alphanumeric characters.
    #[must_use]
    pub fn is_valid_salesforce_id(id: &str) -> bool {
        let len = id.len();
        (len == 15 || len == 18) && id.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string_injection_attempts() {
        assert_eq!(
            soql::escape_string("' OR Name LIKE '%"),
            "\\' OR Name LIKE \\'%"
        );
        assert_eq!(soql::escape_string("a\\b"), "a\\\\b");
        assert_eq!(soql::escape_string("line1\nline2"), "line1\\nline2");
        assert_eq!(soql::escape_string("say \"hi\""), "say \\\"hi\\\"");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(soql::escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(soql::escape_like("O'Brien%"), "O\\'Brien\\%");
    }

    #[test]
    fn test_is_safe_field_name() {
        assert!(soql::is_safe_field_name("Id"));
        assert!(soql::is_safe_field_name("Custom__c"));
        assert!(soql::is_safe_field_name("Owner.Profile.Name"));
        assert!(!soql::is_safe_field_name(""));
        assert!(!soql::is_safe_field_name("1Field"));
        assert!(!soql::is_safe_field_name("Name,Id"));
        assert!(!soql::is_safe_field_name(".Name"));
        assert!(!soql::is_safe_field_name("Name "));
    }

    #[test]
    fn test_is_safe_sobject_name() {
        assert!(soql::is_safe_sobject_name("Account"));
        assert!(soql::is_safe_sobject_name("Invoice__c"));
        assert!(!soql::is_safe_sobject_name("Account.Owner"));
        assert!(!soql::is_safe_sobject_name("Account/../x"));
    }

    #[test]
    fn test_salesforce_id() {
        assert!(url::is_valid_salesforce_id("001000000000001"));
        assert!(url::is_valid_salesforce_id("001000000000001AAA"));
        assert!(!url::is_valid_salesforce_id("001/../../etc"));
        assert!(!url::is_valid_salesforce_id("short"));
    }
}
