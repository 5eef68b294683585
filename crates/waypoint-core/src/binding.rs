//! Route model binding.
//!
//! A route parameter may declare a binding tag (`.bind("user", "user")`).
//! Before the handler runs, the resolver registered under that tag turns the
//! raw parameter value into a domain object, which handlers then read with
//! [`RequestContext::model`].
//!
//! ```rust
//! use std::sync::Arc;
//! use waypoint_core::binding::{resolver_fn, BindingRegistry};
//! use waypoint_core::BoundModel;
//!
//! struct User { id: u64 }
//!
//! let mut bindings = BindingRegistry::new();
//! bindings.register("user", resolver_fn(|_param, value| {
//!     let found = value
//!         .parse::<u64>()
//!         .ok()
//!         .map(|id| Arc::new(User { id }) as BoundModel);
//!     async move { Ok(found) }
//! }));
//! assert!(bindings.contains("user"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use waypoint_router::ParamBinding;

use crate::context::{BoundModel, RequestContext};
use crate::error::HandlerError;
use crate::types::BoxFuture;

/// Resolves a raw parameter value into a model.
///
/// `Ok(None)` means the model does not exist; the route's missing-model
/// policy then applies.
pub trait ModelResolver: Send + Sync + 'static {
    /// Looks up the model for `value`.
    fn resolve<'a>(
        &'a self,
        param: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<Option<BoundModel>, HandlerError>>;
}

/// A resolver backed by a closure returning an owned future.
pub struct FnResolver<F> {
    func: F,
}

/// Wraps a closure as a [`ModelResolver`].
pub fn resolver_fn<F, Fut>(func: F) -> FnResolver<F>
where
    F: Fn(&str, &str) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<BoundModel>, HandlerError>> + Send + 'static,
{
    FnResolver { func }
}

impl<F, Fut> ModelResolver for FnResolver<F>
where
    F: Fn(&str, &str) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<BoundModel>, HandlerError>> + Send + 'static,
{
    fn resolve<'a>(
        &'a self,
        param: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<Option<BoundModel>, HandlerError>> {
        Box::pin((self.func)(param, value))
    }
}

/// Outcome of binding every declared model of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// Every binding produced a model.
    Bound,
    /// A resolver reported the model as missing.
    Missing {
        /// The parameter whose model is missing.
        param: String,
        /// The raw parameter value.
        value: String,
    },
}

/// Resolvers keyed by binding tag.
#[derive(Default, Clone)]
pub struct BindingRegistry {
    resolvers: HashMap<String, Arc<dyn ModelResolver>>,
}

impl BindingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver under `tag`, replacing any previous one.
    pub fn register<R: ModelResolver>(&mut self, tag: impl Into<String>, resolver: R) {
        self.resolvers.insert(tag.into(), Arc::new(resolver));
    }

    /// Returns true when a resolver is registered for `tag`.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.resolvers.contains_key(tag)
    }

    /// Number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolves `bindings` in declaration order, storing models in `ctx`.
    ///
    /// Stops at the first missing model. A parameter absent from the
    /// context (unmatched optional) is skipped.
    pub async fn bind(
        &self,
        bindings: &[ParamBinding],
        ctx: &mut RequestContext,
    ) -> Result<BindOutcome, HandlerError> {
        for binding in bindings {
            let Some(value) = ctx.param(&binding.param).map(str::to_owned) else {
                continue;
            };
            let resolver = self.resolvers.get(&binding.tag).ok_or_else(|| {
                HandlerError::internal(format!("no resolver registered for '{}'", binding.tag))
            })?;

            match resolver.resolve(&binding.param, &value).await? {
                Some(model) => ctx.insert_model(binding.param.clone(), model),
                None => {
                    tracing::debug!(param = %binding.param, tag = %binding.tag, "bound model missing");
                    return Ok(BindOutcome::Missing {
                        param: binding.param.clone(),
                        value,
                    });
                }
            }
        }
        Ok(BindOutcome::Bound)
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.resolvers.keys().collect();
        tags.sort();
        f.debug_struct("BindingRegistry")
            .field("tags", &tags)
            .finish()
    }
}
