//! Category allow/deny filter.

use crate::{filters::CourierFilter, log_entry::CourierLogEntry};

#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    categories: Vec<String>,
    except: Vec<String>,
}

impl CategoryFilter {
    pub fn new(categories: Vec<String>, except: Vec<String>) -> Self {
        Self { categories, except }
    }
}

fn matches(pattern: &str, category: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => category.starts_with(prefix),
        None => pattern == category,
    }
}

impl CourierFilter for CategoryFilter {
    fn should_log(&self, entry: &CourierLogEntry) -> bool {
        let allowed = self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|pattern| matches(pattern, &entry.category));
        allowed
            && !self
                .except
                .iter()
                .any(|pattern| matches(pattern, &entry.category))
    }
}
