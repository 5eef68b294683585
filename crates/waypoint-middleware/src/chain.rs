//! Resolved middleware chains.
//!
//! A [`ResolvedChain`] is computed once per route when the kernel is built.
//! Per request it is [instantiated](ResolvedChain::instantiate) into a
//! [`Chain`], which pins the middleware instances used for both the inbound
//! phase and the terminate hooks of that request.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{Lifetime, MiddlewareDescriptor};
use crate::middleware::Middleware;

/// One resolved reference: a name, its parameters and where to get an
/// instance.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    name: Arc<str>,
    args: Arc<[String]>,
    descriptor: MiddlewareDescriptor,
}

impl ResolvedEntry {
    pub(crate) fn new(name: &str, args: Vec<String>, descriptor: MiddlewareDescriptor) -> Self {
        Self {
            name: Arc::from(name),
            args: Arc::from(args),
            descriptor,
        }
    }

    /// Alias the entry was resolved from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference parameters.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Instance lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.descriptor.lifetime()
    }

    pub(crate) fn same_reference(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

/// The ordered, immutable middleware list of one route.
#[derive(Debug, Clone, Default)]
pub struct ResolvedChain {
    entries: Vec<ResolvedEntry>,
}

impl ResolvedChain {
    pub(crate) fn new(entries: Vec<ResolvedEntry>) -> Self {
        Self { entries }
    }

    /// Entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    /// Entry names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ResolvedEntry::name).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the route runs no middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Obtains the instances for one request.
    #[must_use]
    pub fn instantiate(&self) -> Chain {
        Chain {
            entries: self
                .entries
                .iter()
                .map(|entry| ChainEntry {
                    name: Arc::clone(&entry.name),
                    args: Arc::clone(&entry.args),
                    middleware: entry.descriptor.instance(),
                })
                .collect(),
        }
    }
}

/// A middleware instance bound to its reference parameters.
#[derive(Clone)]
pub struct ChainEntry {
    name: Arc<str>,
    args: Arc<[String]>,
    middleware: Arc<dyn Middleware>,
}

impl ChainEntry {
    /// Wraps an instance directly, bypassing the registry.
    pub fn new(name: &str, args: Vec<String>, middleware: Arc<dyn Middleware>) -> Self {
        Self {
            name: Arc::from(name),
            args: Arc::from(args),
            middleware,
        }
    }

    /// Alias the entry was resolved from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference parameters.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The instance.
    #[must_use]
    pub fn middleware(&self) -> &Arc<dyn Middleware> {
        &self.middleware
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("middleware", &self.middleware.name())
            .finish()
    }
}

/// The middleware instances of one request, outermost first.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    entries: Vec<ChainEntry>,
}

impl Chain {
    /// Builds a chain from explicit entries.
    #[must_use]
    pub fn from_entries(entries: Vec<ChainEntry>) -> Self {
        Self { entries }
    }

    /// Entries, outermost first.
    #[must_use]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;

    fn descriptor(per_request: bool) -> MiddlewareDescriptor {
        let build = || {
            from_fn("pass", |ctx, req, _args, next| {
                Box::pin(async move { next.run(ctx, req).await })
            })
        };
        if per_request {
            MiddlewareDescriptor::per_request(build)
        } else {
            MiddlewareDescriptor::singleton(build())
        }
    }

    #[test]
    fn test_instantiate_respects_lifetime() {
        let resolved = ResolvedChain::new(vec![
            ResolvedEntry::new("shared", Vec::new(), descriptor(false)),
            ResolvedEntry::new("fresh", vec!["1".to_string()], descriptor(true)),
        ]);
        assert_eq!(resolved.names(), ["shared", "fresh"]);

        let first = resolved.instantiate();
        let second = resolved.instantiate();

        assert!(Arc::ptr_eq(
            first.entries()[0].middleware(),
            second.entries()[0].middleware()
        ));
        assert!(!Arc::ptr_eq(
            first.entries()[1].middleware(),
            second.entries()[1].middleware()
        ));
        assert_eq!(first.entries()[1].args(), ["1"]);
    }

    #[test]
    fn test_same_reference() {
        let a = ResolvedEntry::new("throttle", vec!["60".into()], descriptor(false));
        let b = ResolvedEntry::new("throttle", vec!["60".into()], descriptor(false));
        let c = ResolvedEntry::new("throttle", vec!["30".into()], descriptor(false));
        assert!(a.same_reference(&b));
        assert!(!a.same_reference(&c));
    }
}
