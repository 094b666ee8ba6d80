use std::collections::HashSet;

/// Identity keys already handed to the per-item action within one job.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` and returns true the first time it is offered.
    /// Empty keys are never recorded.
    pub fn first_sighting(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.seen.insert(key.to_owned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Normalises a phone number for use as dedup key and destination:
/// a leading `+` and all whitespace are removed.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
    without_plus.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_phone;

    #[test]
    fn strips_plus_and_inner_spaces() {
        assert_eq!(normalize_phone(" +90 537 213 15 04 "), "905372131504");
        assert_eq!(normalize_phone("0532 111 22 33"), "05321112233");
        assert_eq!(normalize_phone(""), "");
    }
}
