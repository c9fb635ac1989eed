//! Route table of the generated entrypoint.
//!
//! The same rules drive code generation and can be evaluated in-process:
//! `/` and `/health` answer with an introspection document, `/<slug>/<rest>`
//! dispatches to `<slug>` with the request path rewritten to `/<rest>`, and
//! anything else is a 404 listing the deployed slugs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;

/// `type` reported by the health document.
pub const ROUTER_TYPE: &str = "function-router";

/// Reserved health path segment.
pub const HEALTH_SEGMENT: &str = "health";

/// One routed function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Function slug (first path segment).
    pub slug: String,
    /// Identifier the module is imported under.
    pub ident: String,
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// Root or `/health`.
    Health,
    /// Dispatch to a function with a rewritten path.
    Function {
        /// Matched slug.
        slug: &'a str,
        /// Path the handler sees.
        path: String,
    },
    /// No function matches the first segment.
    NotFound {
        /// First path segment that failed to match.
        slug: String,
    },
}

/// Ordered route table keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

/// Turns a slug into an import identifier.
///
/// Hyphens become underscores and a `fn_` prefix keeps the result clear of
/// reserved words and leading digits.
#[must_use]
pub fn sanitize_identifier(slug: &str) -> String {
    format!("fn_{}", slug.replace('-', "_"))
}

impl RouteTable {
    /// Builds a table for `slugs`, in order.
    #[must_use]
    pub fn new<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut used = HashSet::new();
        let entries = slugs
            .into_iter()
            .map(|slug| {
                let slug = slug.into();
                let base = sanitize_identifier(&slug);
                let mut ident = base.clone();
                let mut n = 2;
                while !used.insert(ident.clone()) {
                    ident = format!("{base}_{n}");
                    n += 1;
                }
                RouteEntry { slug, ident }
            })
            .collect();

        Self { entries }
    }

    /// Returns the routed entries.
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Returns the deployed slugs in order.
    #[must_use]
    pub fn slugs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.slug.as_str()).collect()
    }

    /// Returns true if no functions are routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a request path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Route<'_> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | [HEALTH_SEGMENT] => Route::Health,
            [first, rest @ ..] => self
                .entries
                .iter()
                .find(|e| e.slug == *first)
                .map_or_else(
                    || Route::NotFound {
                        slug: (*first).to_string(),
                    },
                    |entry| Route::Function {
                        slug: entry.slug.as_str(),
                        path: format!("/{}", rest.join("/")),
                    },
                ),
        }
    }

    /// Health/introspection document served at `/` and `/health`.
    #[must_use]
    pub fn health_body(&self, timestamp: DateTime<Utc>) -> Value {
        json!({
            "status": "ok",
            "type": ROUTER_TYPE,
            "functions": self.slugs(),
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Structured 404 body for an unknown slug.
    #[must_use]
    pub fn not_found_body(&self, slug: &str) -> Value {
        json!({
            "error": "Function not found",
            "function": slug,
            "available": self.slugs(),
        })
    }
}
