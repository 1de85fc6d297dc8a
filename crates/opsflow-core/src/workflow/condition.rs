//! Condition evaluation for conditional steps.
//!
//! Conditions are evaluated after interpolation, over plain text. The
//! grammar is fixed: one binary comparison (`==`, `!=`, `<`, `>`) or a bare
//! expression tested for truthiness. Both operands parse as numbers when
//! possible; otherwise the comparison is lexicographic on the trimmed text.

/// Evaluate an already-interpolated condition string.
pub fn evaluate_condition(condition: &str) -> bool {
    let condition = condition.trim();

    // Two-character operators first so `!=` is not read as a bare `=`.
    for op in ["==", "!=", "<", ">"] {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            return compare(lhs.trim(), rhs.trim(), op);
        }
    }

    is_truthy(condition)
}

fn compare(lhs: &str, rhs: &str, op: &str) -> bool {
    if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        return match op {
            "==" => l == r,
            "!=" => l != r,
            "<" => l < r,
            ">" => l > r,
            _ => false,
        };
    }
    let (lhs, rhs) = (strip_quotes(lhs), strip_quotes(rhs));
    match op {
        "==" => lhs == rhs,
        "!=" => lhs != rhs,
        "<" => lhs < rhs,
        ">" => lhs > rhs,
        _ => false,
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}

/// Bare-expression truthiness: empty, "false", "0" and "null" are falsy.
fn is_truthy(text: &str) -> bool {
    !matches!(text, "" | "false" | "0" | "null")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparisons() {
        assert!(evaluate_condition("2 > 1"));
        assert!(!evaluate_condition("1 > 2"));
        assert!(evaluate_condition("3 == 3.0"));
        assert!(evaluate_condition("1 != 2"));
        assert!(evaluate_condition("0.5 < 1"));
    }

    #[test]
    fn string_comparisons() {
        assert!(evaluate_condition("production == production"));
        assert!(evaluate_condition("staging != production"));
        assert!(evaluate_condition("'staging' == staging"));
        assert!(evaluate_condition("\"a\" < \"b\""));
    }

    #[test]
    fn mixed_operands_compare_as_text() {
        assert!(!evaluate_condition("abc == 1"));
        assert!(evaluate_condition("abc != 1"));
    }

    #[test]
    fn bare_truthiness() {
        assert!(evaluate_condition("yes"));
        assert!(evaluate_condition("true"));
        assert!(!evaluate_condition(""));
        assert!(!evaluate_condition("false"));
        assert!(!evaluate_condition("0"));
        assert!(!evaluate_condition("null"));
    }

    #[test]
    fn not_equal_is_not_parsed_as_bare_text() {
        assert!(!evaluate_condition("x != x"));
    }
}
