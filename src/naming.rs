//! Conversion between Rust-friendly field names and JSON:API member names.
//!
//! `active_status` becomes `active-status`, and a double underscore addresses a nested
//! attribute: `valid_for__start_datetime` becomes `valid-for.start-datetime`.

pub fn jsonify_name(name: &str) -> String {
    name.replace("__", ".").replace('_', "-")
}

pub fn dejsonify_name(name: &str) -> String {
    name.replace('.', "__").replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonify() {
        assert_eq!(jsonify_name("active_status"), "active-status");
        assert_eq!(jsonify_name("valid_for__start_datetime"), "valid-for.start-datetime");
        assert_eq!(jsonify_name("already-dashed"), "already-dashed");
    }

    #[test]
    fn test_dejsonify() {
        assert_eq!(dejsonify_name("lease-items"), "lease_items");
        assert_eq!(dejsonify_name("valid-for.end-datetime"), "valid_for__end_datetime");
    }
}
