//! Keyword collection domain helper.

/// Keeps keyword normalization in one place before keywords reach the deposition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keywords {
    items: Vec<String>,
}

impl Keywords {
    pub fn new(items: Vec<String>) -> Self {
        let mut kw = Self { items };
        kw.normalize();
        kw
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }

    fn normalize(&mut self) {
        for kw in &mut self.items {
            let trimmed = kw.trim();
            if trimmed.len() != kw.len() {
                *kw = trimmed.to_string();
            }
        }
        // Dedup case-insensitively while preserving original casing of first occurrence.
        let mut seen = Vec::<String>::new();
        self.items.retain(|kw| {
            if kw.is_empty() {
                return false;
            }
            let lower = kw.to_lowercase();
            if seen.contains(&lower) {
                false
            } else {
                seen.push(lower);
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::Keywords;

    #[test]
    fn keywords_dedup_case_insensitively_keeping_first_spelling() {
        let kw = Keywords::new(vec![
            "Ecology".into(),
            "forecasting".into(),
            "ecology".into(),
            "Forecasting".into(),
        ]);
        assert_eq!(kw.into_vec(), vec!["Ecology", "forecasting"]);
    }

    #[test]
    fn keywords_drop_blank_entries_and_trim() {
        let kw = Keywords::new(vec!["  rodents ".into(), "   ".into(), "".into()]);
        assert_eq!(kw.into_vec(), vec!["rodents"]);
    }
}
