//! Counted nouns for log lines.

/// `3 bundles`, `1 document`, `0 files`.
pub fn plural_count(count: usize, noun: &str) -> String {
    match count {
        1 => format!("1 {noun}"),
        n => format!("{n} {noun}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::plural_count;

    #[test]
    fn test_plural_count() {
        assert_eq!(plural_count(0, "asset"), "0 assets");
        assert_eq!(plural_count(1, "bundle"), "1 bundle");
        assert_eq!(plural_count(12, "error"), "12 errors");
    }
}
