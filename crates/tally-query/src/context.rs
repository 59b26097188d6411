//! # Session & Settings
//!
//! Who is asking and how they like their reports, passed in explicitly
//! rather than read from ambient state.

use serde::{Deserialize, Serialize};
use tally_core::{Selection, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// The signed-in user, as far as reporting and movements care.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: String,
    pub display_name: String,
    /// When set, every report and movement is confined to this store.
    pub store_scope: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        SessionContext {
            user_id: user_id.into(),
            display_name: display_name.into(),
            store_scope: None,
        }
    }

    pub fn with_store_scope(mut self, store_id: impl Into<String>) -> Self {
        let store_id = store_id.into();
        self.store_scope = if store_id.trim().is_empty() {
            None
        } else {
            Some(store_id)
        };
        self
    }

    /// The store selection a report actually uses: a scoped session always
    /// sees its own store, whatever was requested.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::Selection;
    /// use tally_query::SessionContext;
    ///
    /// let manager = SessionContext::new("u1", "Ana");
    /// assert_eq!(manager.effective_store(&Selection::All), Selection::All);
    ///
    /// let barista = SessionContext::new("u2", "Sam").with_store_scope("s1");
    /// assert_eq!(barista.effective_store(&Selection::All), Selection::Only("s1".into()));
    /// ```
    pub fn effective_store(&self, requested: &Selection) -> Selection {
        match &self.store_scope {
            Some(scope) => Selection::Only(scope.clone()),
            None => requested.clone(),
        }
    }

    /// Whether this session may write to `shop_id`.
    pub fn can_modify(&self, shop_id: &str) -> bool {
        self.store_scope.as_deref().map_or(true, |scope| scope == shop_id)
    }

    /// Name stamped on rows this session records.
    pub fn operator(&self) -> Option<String> {
        let name = self.display_name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Report preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub page_size: u32,
}

impl ReportSettings {
    /// Clamps `page_size` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page_size: u32) -> Self {
        ReportSettings {
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_overrides_requested_store() {
        let ctx = SessionContext::new("u1", "Sam").with_store_scope("s1");
        assert_eq!(
            ctx.effective_store(&Selection::Only("s2".into())),
            Selection::Only("s1".into())
        );
        assert!(ctx.can_modify("s1"));
        assert!(!ctx.can_modify("s2"));
    }

    #[test]
    fn test_blank_scope_is_unscoped() {
        let ctx = SessionContext::new("u1", "Sam").with_store_scope("  ");
        assert_eq!(ctx.store_scope, None);
        assert!(ctx.can_modify("anything"));
    }

    #[test]
    fn test_operator_name() {
        assert_eq!(SessionContext::new("u1", " Maria ").operator().as_deref(), Some("Maria"));
        assert_eq!(SessionContext::default().operator(), None);
    }

    #[test]
    fn test_settings_clamp() {
        assert_eq!(ReportSettings::new(0).page_size, 1);
        assert_eq!(ReportSettings::new(10_000).page_size, MAX_PAGE_SIZE);
        assert_eq!(ReportSettings::default().page_size, DEFAULT_PAGE_SIZE);
    }
}
