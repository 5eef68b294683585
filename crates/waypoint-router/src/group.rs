//! Route groups.
//!
//! A group is a scope of inherited attributes. Scopes nest: prefixes and
//! name prefixes concatenate outer to inner, middleware lists append outer to
//! inner, and the innermost declared domain wins.

use crate::route::GroupSnapshot;

/// Attributes declared by one `group` call.
///
/// # Example
///
/// ```rust
/// use waypoint_router::GroupAttributes;
///
/// let admin = GroupAttributes::new()
///     .prefix("/admin")
///     .name("admin.")
///     .middleware(["auth"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupAttributes {
    prefix: Option<String>,
    domain: Option<String>,
    name: Option<String>,
    middleware: Vec<String>,
    without_middleware: Vec<String>,
}

impl GroupAttributes {
    /// Empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix joined with `/`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Host pattern for every route in the group.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Name prefix, concatenated verbatim (include your own separator).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Middleware references appended to every route in the group.
    pub fn middleware<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(refs.into_iter().map(Into::into));
        self
    }

    /// Middleware names excluded from every route in the group.
    pub fn without_middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.without_middleware
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// The merged attributes of every active group, outermost first.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupScope {
    pub prefix: String,
    pub domain: Option<String>,
    pub name_prefix: String,
    pub middleware: Vec<String>,
    pub without_middleware: Vec<String>,
}

impl GroupScope {
    /// Nests `attrs` inside this scope.
    pub fn nest(&self, attrs: GroupAttributes) -> Self {
        let prefix = match attrs.prefix {
            Some(prefix) => join_paths(&self.prefix, &prefix),
            None => self.prefix.clone(),
        };

        let mut middleware = self.middleware.clone();
        middleware.extend(attrs.middleware);
        let mut without_middleware = self.without_middleware.clone();
        without_middleware.extend(attrs.without_middleware);

        Self {
            prefix,
            domain: attrs.domain.or_else(|| self.domain.clone()),
            name_prefix: format!("{}{}", self.name_prefix, attrs.name.unwrap_or_default()),
            middleware,
            without_middleware,
        }
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            prefix: self.prefix.clone(),
            domain: self.domain.clone(),
            name_prefix: self.name_prefix.clone(),
        }
    }
}

/// Joins two path fragments with exactly one `/` between them.
///
/// The result always starts with `/`; an empty result is `/`.
pub(crate) fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_matches('/');
    let path = path.trim_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{base}"),
        (false, false) => format!("/{base}/{path}"),
    }
}
