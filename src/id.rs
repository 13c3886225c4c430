use uuid::Uuid;

pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Deterministic id for the copy of `source_id` made under the duplicate rooted at
/// `root_id`. Re-running the same duplication yields the same ids.
pub fn derived_id(root_id: &str, source_id: &str) -> String {
    let namespace = Uuid::parse_str(root_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, root_id.as_bytes()));
    Uuid::new_v5(&namespace, source_id.as_bytes()).to_string()
}
