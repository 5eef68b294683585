//! The route table.
//!
//! Routes are kept in registration order and matched with a linear scan:
//! the first route whose domain, path and method all match wins. Earlier
//! routes therefore shadow later ambiguous ones, e.g. `/user/{id}` shadows a
//! later `/user/profile`.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::error::{MatchError, RouteError};
use crate::group::{GroupAttributes, GroupScope};
use crate::params::Params;
use crate::pattern::split_path;
use crate::route::{Route, RouteDefinition};

/// A matched route with its decoded parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route.
    pub route: Arc<Route>,
    /// Domain parameters, then path parameters, in declaration order.
    pub params: Params,
}

impl RouteMatch {
    /// Returns a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

/// Ordered collection of routes plus a name index.
///
/// The table is mutated only while routes are registered. Once handed to a
/// kernel it is read-only and can be shared across tasks without locking.
///
/// # Example
///
/// ```rust
/// use waypoint_router::{GroupAttributes, RouteDefinition, RouteTable};
/// use http::Method;
///
/// let mut table = RouteTable::new();
/// table.group(GroupAttributes::new().prefix("/api").name("api."), |api| {
///     api.register(RouteDefinition::get("/users/{id}", "users.show").name("users.show"))?;
///     Ok(())
/// })?;
///
/// let found = table.match_route(&Method::GET, None, "/api/users/42").unwrap();
/// assert_eq!(found.route.name(), Some("api.users.show"));
/// assert_eq!(found.param("id"), Some("42"));
/// # Ok::<(), waypoint_router::RouteError>(())
/// ```
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    names: HashMap<String, usize>,
    scopes: Vec<GroupScope>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and appends a route under the active group scope.
    pub fn register(&mut self, definition: RouteDefinition) -> Result<Arc<Route>, RouteError> {
        let route = {
            let root = GroupScope::default();
            let scope = self.scopes.last().unwrap_or(&root);
            definition.compile(self.routes.len(), scope)?
        };

        if let Some(name) = route.name() {
            if self.names.contains_key(name) {
                return Err(RouteError::duplicate_name(name));
            }
            self.names.insert(name.to_string(), route.index());
        }

        tracing::trace!(route = %route, "registered route");
        let route = Arc::new(route);
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Registers a `GET` route.
    pub fn get(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::get(path, handler))
    }

    /// Registers a `POST` route.
    pub fn post(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::post(path, handler))
    }

    /// Registers a `PUT` route.
    pub fn put(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::put(path, handler))
    }

    /// Registers a `PATCH` route.
    pub fn patch(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::patch(path, handler))
    }

    /// Registers a `DELETE` route.
    pub fn delete(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::delete(path, handler))
    }

    /// Registers an `OPTIONS` route.
    pub fn options(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::options(path, handler))
    }

    /// Registers a route for every standard method.
    pub fn any(&mut self, path: &str, handler: &str) -> Result<Arc<Route>, RouteError> {
        self.register(RouteDefinition::any(path, handler))
    }

    /// Registers a route for an explicit method list.
    pub fn match_methods<I>(
        &mut self,
        methods: I,
        path: &str,
        handler: &str,
    ) -> Result<Arc<Route>, RouteError>
    where
        I: IntoIterator<Item = Method>,
    {
        self.register(RouteDefinition::new(methods, path, handler))
    }

    /// Registers routes inside a group scope.
    ///
    /// The scope is popped when `build` returns, whether or not it failed.
    pub fn group<F>(&mut self, attrs: GroupAttributes, build: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Self) -> Result<(), RouteError>,
    {
        let scope = match self.scopes.last() {
            Some(outer) => outer.nest(attrs),
            None => GroupScope::default().nest(attrs),
        };
        self.scopes.push(scope);
        let result = build(self);
        self.scopes.pop();
        result
    }

    /// Looks up a route by its fully prefixed name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.names.get(name).map(|&index| &self.routes[index])
    }

    /// Returns true when a route carries `name`.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Matches a request.
    ///
    /// `host` is the request's `Host` value (port allowed). Routes with a
    /// domain pattern never match when it is `None`.
    pub fn match_route(
        &self,
        method: &Method,
        host: Option<&str>,
        path: &str,
    ) -> Result<RouteMatch, MatchError> {
        let segments = split_path(path);
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = Self::capture(route, host, &segments) else {
                continue;
            };

            if route.methods().contains(method) {
                tracing::debug!(route = %route, %method, path, "route matched");
                return Ok(RouteMatch {
                    route: Arc::clone(route),
                    params,
                });
            }

            for candidate in route.methods().as_slice() {
                if !allowed.contains(candidate) {
                    allowed.push(candidate.clone());
                }
            }
        }

        if allowed.is_empty() {
            tracing::debug!(%method, path, "no route matched");
            Err(MatchError::NotFound {
                method: method.clone(),
                path: path.to_string(),
            })
        } else {
            tracing::debug!(%method, path, ?allowed, "method not allowed");
            Err(MatchError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            })
        }
    }

    fn capture(route: &Route, host: Option<&str>, segments: &[&str]) -> Option<Params> {
        let mut params = Params::new();
        if let Some(domain) = route.domain() {
            if !domain.capture(host?, &mut params) {
                return None;
            }
        }
        route
            .pattern()
            .capture(segments, &mut params)
            .then_some(params)
    }

    /// Routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
