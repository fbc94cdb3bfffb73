//! Query-string state for catalog filters and pagination.
//!
//! Mirrors what the catalog UI does to its own URL: changing a filter always
//! sends the user back to the first page, clearing filters keeps the search
//! term, and page navigation is clamped to the available range.

use url::form_urlencoded;

/// Keys managed as filters (everything except `page`).
pub const FILTER_KEYS: [&str; 6] = ["q", "brand", "yearMin", "yearMax", "priceMin", "priceMax"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pairs: Vec<(String, String)>,
}

impl QueryState {
    /// Parses a raw query string, with or without the leading `?`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self { pairs: form_urlencoded::parse(raw.as_bytes()).into_owned().collect() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.pairs[idx].1 = value.to_string();
                // Later duplicates lose, like URLSearchParams::set
                let mut seen = false;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    fn delete(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Sets `key` (an empty value removes it) and drops the page.
    pub fn set_filter(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.delete(key);
        } else {
            self.set(key, value);
        }
        self.delete("page");
    }

    /// Drops every parameter except a non-blank search term.
    pub fn clear_filters(&mut self) {
        let keep = self.get("q").map(str::trim).filter(|q| !q.is_empty()).map(str::to_string);
        self.pairs.clear();
        if let Some(q) = keep {
            self.pairs.push(("q".to_string(), q));
        }
    }

    /// Moves to `page` clamped to `[1, total_pages]`; page 1 is the absence of the key.
    pub fn go_to_page(&mut self, page: i64, total_pages: i64) {
        let target = page.min(total_pages).max(1);
        if target <= 1 {
            self.delete("page");
        } else {
            self.set("page", &target.to_string());
        }
    }

    /// Whether any filter other than pagination is set.
    pub fn has_active_filters(&self) -> bool {
        FILTER_KEYS.iter().any(|key| match self.get(key) {
            Some(v) if *key == "q" => !v.trim().is_empty(),
            Some(v) => !v.is_empty(),
            None => false,
        })
    }

    /// Encoded form without the leading `?`; empty when no parameters remain.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new()).extend_pairs(self.pairs.iter()).finish()
    }

    /// `path` with the encoded query appended, or just `path` when empty.
    pub fn href(&self, path: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        }
    }
}

/// Links to the previous and next page, `None` at either end.
pub fn page_links(raw_query: &str, path: &str, page: i64, total_pages: i64) -> (Option<String>, Option<String>) {
    let base = QueryState::parse(raw_query);
    let prev = (page > 1).then(|| {
        let mut state = base.clone();
        state.go_to_page(page - 1, total_pages);
        state.href(path)
    });
    let next = (page < total_pages).then(|| {
        let mut state = base.clone();
        state.go_to_page(page + 1, total_pages);
        state.href(path)
    });
    (prev, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_filter_resets_page() {
        let mut state = QueryState::parse("?brand=Ford&page=3");
        state.set_filter("yearMin", "2015");
        assert_eq!(state.to_query_string(), "brand=Ford&yearMin=2015");

        state.set_filter("brand", "");
        assert_eq!(state.to_query_string(), "yearMin=2015");
    }

    #[test]
    fn test_set_filter_replaces_duplicates() {
        let mut state = QueryState::parse("brand=Ford&brand=Fiat");
        state.set_filter("brand", "Toyota");
        assert_eq!(state.to_query_string(), "brand=Toyota");
    }

    #[test]
    fn test_clear_filters_keeps_search() {
        let mut state = QueryState::parse("q=%20fiesta%20&brand=Ford&page=2");
        state.clear_filters();
        assert_eq!(state.to_query_string(), "q=fiesta");

        let mut state = QueryState::parse("q=%20%20&brand=Ford");
        state.clear_filters();
        assert_eq!(state.to_query_string(), "");
    }

    #[test]
    fn test_go_to_page_clamps() {
        let mut state = QueryState::parse("brand=Ford");
        state.go_to_page(5, 3);
        assert_eq!(state.get("page"), Some("3"));
        state.go_to_page(1, 3);
        assert_eq!(state.get("page"), None);
        state.go_to_page(-4, 3);
        assert_eq!(state.get("page"), None);
        state.go_to_page(2, 0);
        assert_eq!(state.get("page"), None);
    }

    #[test]
    fn test_active_filters() {
        assert!(!QueryState::parse("page=2").has_active_filters());
        assert!(!QueryState::parse("q=%20").has_active_filters());
        assert!(QueryState::parse("priceMax=100").has_active_filters());
    }

    #[test]
    fn test_page_links() {
        let (prev, next) = page_links("brand=Ford&page=2", "/vehicles", 2, 3);
        assert_eq!(prev.as_deref(), Some("/vehicles?brand=Ford"));
        assert_eq!(next.as_deref(), Some("/vehicles?brand=Ford&page=3"));

        let (prev, next) = page_links("", "/vehicles", 1, 1);
        assert!(prev.is_none());
        assert!(next.is_none());
    }
}
