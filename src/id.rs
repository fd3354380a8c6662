use uuid::Uuid;

/// Time-ordered id for newly minted records.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Collision-resistant stem for uploaded blob names. Random rather than
/// time-ordered so storage paths do not leak upload order.
pub fn new_storage_stem() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_v7_is_parseable_and_unique() {
        let a = new_uuid_v7();
        let b = new_uuid_v7();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn storage_stem_has_no_separators() {
        let stem = new_storage_stem();
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
