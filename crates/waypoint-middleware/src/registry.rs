//! Middleware aliases, groups and chain resolution.
//!
//! Routes name their middleware with short references. The registry turns a
//! route's references into a [`ResolvedChain`]:
//!
//! 1. global references, then the route's own (group middleware first)
//! 2. groups expanded recursively, aliases mapped to descriptors
//! 3. excluded names removed (excluding a group removes its members)
//! 4. repeated `name:args` pairs dropped, first occurrence kept
//! 5. entries named in the priority list stably re-sorted among themselves
//!
//! Every failure is a [`MiddlewareError`] raised while the kernel is built.

use std::collections::{BTreeMap, HashMap, HashSet};

use waypoint_config::MiddlewareConfig;
use waypoint_router::Route;

use crate::chain::{ResolvedChain, ResolvedEntry};
use crate::descriptor::{MiddlewareDescriptor, MiddlewareRef};
use crate::error::MiddlewareError;

/// Descriptors the application can build, keyed by the names configuration
/// files refer to.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareCatalog {
    entries: HashMap<String, MiddlewareDescriptor>,
}

impl MiddlewareCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor under `key`.
    pub fn insert(&mut self, key: impl Into<String>, descriptor: MiddlewareDescriptor) -> &mut Self {
        self.entries.insert(key.into(), descriptor);
        self
    }

    /// The descriptor under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MiddlewareDescriptor> {
        self.entries.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aliases, groups, global middleware and priority.
///
/// Populated once at startup and read-only afterwards.
///
/// # Example
///
/// ```rust
/// use waypoint_middleware::{from_fn, MiddlewareDescriptor, MiddlewareRegistry};
///
/// let pass = || {
///     MiddlewareDescriptor::singleton(from_fn("pass", |ctx, req, _args, next| {
///         Box::pin(async move { next.run(ctx, req).await })
///     }))
/// };
///
/// let mut registry = MiddlewareRegistry::new();
/// registry
///     .alias("session", pass())
///     .alias("auth", pass())
///     .group("web", ["session"]);
///
/// let chain = registry.resolve(&["web", "auth"], &[] as &[&str])?;
/// assert_eq!(chain.names(), ["session", "auth"]);
/// # Ok::<(), waypoint_middleware::MiddlewareError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiddlewareRegistry {
    aliases: BTreeMap<String, MiddlewareDescriptor>,
    groups: BTreeMap<String, Vec<String>>,
    global: Vec<String>,
    priority: Vec<String>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an alias, replacing any previous one.
    pub fn alias(&mut self, name: impl Into<String>, descriptor: MiddlewareDescriptor) -> &mut Self {
        self.aliases.insert(name.into(), descriptor);
        self
    }

    /// Registers a group, replacing any previous one.
    pub fn group<I, S>(&mut self, name: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Appends references that run before every route's own middleware.
    pub fn global<I, S>(&mut self, references: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global.extend(references.into_iter().map(Into::into));
        self
    }

    /// Appends names to the priority list.
    pub fn priority<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority.extend(names.into_iter().map(Into::into));
        self
    }

    /// Returns true if `name` is an alias.
    #[must_use]
    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Returns true if `name` is a group.
    #[must_use]
    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Number of aliases.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Number of groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Loads aliases, groups, global references and priority from a
    /// configuration section, mapping alias targets through `catalog`.
    pub fn apply_config(
        &mut self,
        config: &MiddlewareConfig,
        catalog: &MiddlewareCatalog,
    ) -> Result<&mut Self, MiddlewareError> {
        for (alias, key) in &config.aliases {
            let descriptor = catalog
                .get(key)
                .ok_or_else(|| MiddlewareError::unknown_catalog_key(alias, key))?;
            self.alias(alias.clone(), descriptor.clone());
        }
        for (group, members) in &config.groups {
            self.group(group.clone(), members.iter().cloned());
        }
        self.global(config.global.iter().cloned());
        self.priority(config.priority.iter().cloned());
        Ok(self)
    }

    /// Checks every group and global reference.
    ///
    /// Detects names registered as both alias and group, unknown names,
    /// empty references, parameterised group references and group cycles.
    pub fn validate(&self) -> Result<(), MiddlewareError> {
        if let Some(name) = self.aliases.keys().find(|name| self.groups.contains_key(*name)) {
            return Err(MiddlewareError::AmbiguousName { name: name.clone() });
        }

        let mut scratch = Vec::new();
        for group in self.groups.keys() {
            self.expand(group, &mut Vec::new(), &mut scratch)?;
            scratch.clear();
        }
        for reference in &self.global {
            self.expand(reference, &mut Vec::new(), &mut scratch)?;
            scratch.clear();
        }
        for name in &self.priority {
            MiddlewareRef::parse(name)?;
        }
        Ok(())
    }

    /// Resolves a route's middleware.
    pub fn resolve_route(&self, route: &Route) -> Result<ResolvedChain, MiddlewareError> {
        self.resolve(route.middleware(), route.excluded_middleware())
    }

    /// Resolves references into an ordered chain.
    pub fn resolve<R, X>(&self, references: &[R], excluded: &[X]) -> Result<ResolvedChain, MiddlewareError>
    where
        R: AsRef<str>,
        X: AsRef<str>,
    {
        let mut expanded = Vec::new();
        for reference in self
            .global
            .iter()
            .map(String::as_str)
            .chain(references.iter().map(AsRef::as_ref))
        {
            self.expand(reference, &mut Vec::new(), &mut expanded)?;
        }

        let excluded = self.excluded_names(excluded)?;
        let mut entries: Vec<ResolvedEntry> = Vec::with_capacity(expanded.len());
        for entry in expanded {
            if excluded.contains(entry.name()) {
                continue;
            }
            if entries.iter().any(|kept| kept.same_reference(&entry)) {
                continue;
            }
            entries.push(entry);
        }

        self.apply_priority(&mut entries)?;

        let chain = ResolvedChain::new(entries);
        tracing::debug!(middleware = ?chain.names(), "resolved middleware chain");
        Ok(chain)
    }

    fn expand(
        &self,
        reference: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<ResolvedEntry>,
    ) -> Result<(), MiddlewareError> {
        let parsed = MiddlewareRef::parse(reference)?;

        if let Some(members) = self.groups.get(&parsed.name) {
            if self.aliases.contains_key(&parsed.name) {
                return Err(MiddlewareError::AmbiguousName { name: parsed.name });
            }
            if parsed.has_args() {
                return Err(MiddlewareError::parameterized_group(parsed.name));
            }
            Self::enter_group(stack, &parsed.name)?;
            for member in members {
                self.expand(member, stack, out)?;
            }
            stack.pop();
            return Ok(());
        }

        let descriptor = self
            .aliases
            .get(&parsed.name)
            .ok_or_else(|| MiddlewareError::unknown_reference(&parsed.name))?;
        out.push(ResolvedEntry::new(&parsed.name, parsed.args, descriptor.clone()));
        Ok(())
    }

    fn enter_group(stack: &mut Vec<String>, group: &str) -> Result<(), MiddlewareError> {
        if let Some(start) = stack.iter().position(|g| g == group) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(group.to_string());
            return Err(MiddlewareError::CyclicGroup { cycle });
        }
        stack.push(group.to_string());
        Ok(())
    }

    /// Leaf names under `name`, in group order. Unknown names are kept
    /// as-is.
    fn leaf_names(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), MiddlewareError> {
        match self.groups.get(name) {
            Some(members) => {
                Self::enter_group(stack, name)?;
                for member in members {
                    let parsed = MiddlewareRef::parse(member)?;
                    self.leaf_names(&parsed.name, stack, out)?;
                }
                stack.pop();
            }
            None => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    fn excluded_names<X: AsRef<str>>(&self, excluded: &[X]) -> Result<HashSet<String>, MiddlewareError> {
        let mut names = Vec::new();
        for reference in excluded {
            let parsed = MiddlewareRef::parse(reference.as_ref())?;
            self.leaf_names(&parsed.name, &mut Vec::new(), &mut names)?;
        }
        Ok(names.into_iter().collect())
    }

    fn apply_priority(&self, entries: &mut [ResolvedEntry]) -> Result<(), MiddlewareError> {
        if self.priority.is_empty() {
            return Ok(());
        }

        let mut order = Vec::new();
        for name in &self.priority {
            let parsed = MiddlewareRef::parse(name)?;
            self.leaf_names(&parsed.name, &mut Vec::new(), &mut order)?;
        }
        let rank = |entry: &ResolvedEntry| order.iter().position(|n| n == entry.name());

        let slots: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| rank(entry).is_some())
            .map(|(i, _)| i)
            .collect();
        let mut ranked: Vec<ResolvedEntry> = slots.iter().map(|&i| entries[i].clone()).collect();
        ranked.sort_by_key(|entry| rank(entry));

        for (slot, entry) in slots.into_iter().zip(ranked) {
            entries[slot] = entry;
        }
        Ok(())
    }
}
