use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static COPY_SUFFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.*?)\s+Copy\s+\d+$").expect("copy suffix pattern to compile")
});

/// Name without a trailing `" Copy <n>"`, so copies of copies stay in one family.
pub fn base_name(source_name: &str) -> &str {
    COPY_SUFFIX_PATTERN
        .captures(source_name)
        .and_then(|caps| caps.get(1))
        .map_or(source_name, |base| base.as_str())
}

fn copy_number(sibling: &str, prefix: &str) -> Option<u64> {
    let digits = sibling.strip_prefix(prefix)?;
    let numeric = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    if !numeric || digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// Name for a copy of `source_name` that no entry of `sibling_names` uses.
///
/// Picks the smallest positive `n` such that `"<base> Copy <n>"` is free, which
/// reuses gaps left by deleted copies. The caller supplies a complete, current
/// snapshot of the sibling names.
pub fn generate_copy_name<S: AsRef<str>>(source_name: &str, sibling_names: &[S]) -> String {
    let base = base_name(source_name);
    let prefix = format!("{base} Copy ");
    let taken: BTreeSet<u64> = sibling_names
        .iter()
        .filter_map(|name| copy_number(name.as_ref(), &prefix))
        .collect();

    let mut next = 1u64;
    for n in &taken {
        if *n != next {
            break;
        }
        next += 1;
    }
    format!("{prefix}{next}")
}
