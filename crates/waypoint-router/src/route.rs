//! Route descriptors.
//!
//! A [`RouteDefinition`] is the mutable, author-facing description of a
//! route. Registering it with a [`RouteTable`](crate::RouteTable) merges the
//! active group scope into it and compiles it into an immutable [`Route`].

use std::collections::HashSet;
use std::fmt;

use http::Method;

use crate::error::RouteError;
use crate::group::GroupScope;
use crate::pattern::{Constraint, DomainPattern, ParamRules, PathPattern};

/// All methods accepted by [`RouteDefinition::any`].
pub const ANY_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// An ordered, duplicate-free set of HTTP methods.
///
/// `GET` always brings `HEAD` along.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodSet {
    methods: Vec<Method>,
}

impl MethodSet {
    /// Builds a set from any list of methods.
    pub fn new<I: IntoIterator<Item = Method>>(methods: I) -> Self {
        let mut set = Self::default();
        for method in methods {
            set.insert(method);
        }
        set
    }

    fn insert(&mut self, method: Method) {
        let implies_head = method == Method::GET;
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        if implies_head && !self.methods.contains(&Method::HEAD) {
            self.methods.push(Method::HEAD);
        }
    }

    /// Returns true when `method` is accepted.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Methods in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Method] {
        &self.methods
    }

    /// Returns true when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

/// What to do when a bound model cannot be found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MissingModel {
    /// Fail the request with a 404 handler error.
    #[default]
    NotFound,
    /// Redirect (302) to the given location.
    Redirect(String),
    /// Invoke another registered handler instead.
    Handler(String),
}

/// A route parameter resolved into a domain object by a named resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    /// The route parameter.
    pub param: String,
    /// The resolver tag registered with the binding registry.
    pub tag: String,
}

/// Author-facing route description.
///
/// # Example
///
/// ```rust
/// use waypoint_router::RouteDefinition;
///
/// let def = RouteDefinition::get("/users/{id}", "users.show")
///     .name("users.show")
///     .where_param("id", "[0-9]+")
///     .middleware(["auth", "throttle:60,1"]);
///
/// assert_eq!(def.path(), "/users/{id}");
/// ```
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    methods: Vec<Method>,
    path: String,
    handler: String,
    name: Option<String>,
    domain: Option<String>,
    middleware: Vec<String>,
    without_middleware: Vec<String>,
    constraints: Vec<(String, String)>,
    defaults: Vec<(String, String)>,
    bindings: Vec<ParamBinding>,
    missing: MissingModel,
}

impl RouteDefinition {
    /// Creates a definition for an explicit list of methods.
    pub fn new<I>(methods: I, path: impl Into<String>, handler: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        Self {
            methods: methods.into_iter().collect(),
            path: path.into(),
            handler: handler.into(),
            name: None,
            domain: None,
            middleware: Vec::new(),
            without_middleware: Vec::new(),
            constraints: Vec::new(),
            defaults: Vec::new(),
            bindings: Vec::new(),
            missing: MissingModel::default(),
        }
    }

    /// `GET` (and `HEAD`) route.
    pub fn get(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::GET], path, handler)
    }

    /// `POST` route.
    pub fn post(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::POST], path, handler)
    }

    /// `PUT` route.
    pub fn put(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::PUT], path, handler)
    }

    /// `PATCH` route.
    pub fn patch(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::PATCH], path, handler)
    }

    /// `DELETE` route.
    pub fn delete(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::DELETE], path, handler)
    }

    /// `OPTIONS` route.
    pub fn options(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new([Method::OPTIONS], path, handler)
    }

    /// Route accepting every method in [`ANY_METHODS`].
    pub fn any(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(ANY_METHODS, path, handler)
    }

    /// Names the route. The group name prefix is prepended at registration.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the route to a host pattern, overriding any group domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Appends middleware references (`name` or `name:arg1,arg2`).
    pub fn middleware<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(refs.into_iter().map(Into::into));
        self
    }

    /// Excludes middleware (by alias or group name) inherited from groups or globals.
    pub fn without_middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.without_middleware
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Constrains a parameter with a regular expression.
    pub fn where_param(mut self, param: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.push((param.into(), regex.into()));
        self
    }

    /// Constrains a parameter to ASCII digits.
    pub fn where_number(self, param: impl Into<String>) -> Self {
        self.where_param(param, "[0-9]+")
    }

    /// Constrains a parameter to ASCII letters.
    pub fn where_alpha(self, param: impl Into<String>) -> Self {
        self.where_param(param, "[a-zA-Z]+")
    }

    /// Default value for an optional parameter.
    pub fn default_value(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.push((param.into(), value.into()));
        self
    }

    /// Resolves `param` through the resolver registered under `tag`.
    pub fn bind(mut self, param: impl Into<String>, tag: impl Into<String>) -> Self {
        self.bindings.push(ParamBinding {
            param: param.into(),
            tag: tag.into(),
        });
        self
    }

    /// Behavior when a bound model is missing.
    pub fn missing(mut self, missing: MissingModel) -> Self {
        self.missing = missing;
        self
    }

    /// The path as written, before any group prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn compile(self, index: usize, scope: &GroupScope) -> Result<Route, RouteError> {
        let uri = crate::group::join_paths(&scope.prefix, &self.path);
        let methods = MethodSet::new(self.methods);
        if methods.is_empty() {
            return Err(RouteError::EmptyMethods { pattern: uri });
        }

        let mut rules = ParamRules::default();
        for (param, regex) in &self.constraints {
            rules
                .constraints
                .insert(param.clone(), Constraint::new(param, regex)?);
        }
        rules.defaults.extend(self.defaults.iter().cloned());

        let pattern = PathPattern::parse(&uri, &rules)?;
        let domain = self
            .domain
            .or_else(|| scope.domain.clone())
            .map(|d| DomainPattern::parse(&d, &rules))
            .transpose()?;

        let mut declared = HashSet::new();
        let domain_params = domain.iter().flat_map(|d| d.params());
        for param in domain_params.chain(pattern.params()) {
            if !declared.insert(param.name.as_str()) {
                return Err(RouteError::DuplicateParam {
                    pattern: uri.clone(),
                    param: param.name.clone(),
                });
            }
        }

        let check = |param: &str, rule: &'static str| {
            if declared.contains(param) {
                Ok(())
            } else {
                Err(RouteError::unknown_param(&uri, param, rule))
            }
        };
        for (param, _) in &self.constraints {
            check(param, "constraint")?;
        }
        for (param, _) in &self.defaults {
            check(param, "default")?;
        }
        if let Some(param) = domain
            .iter()
            .flat_map(|d| d.params())
            .chain(pattern.params())
            .find(|p| p.default.as_deref().is_some_and(|value| !p.accepts(value)))
        {
            return Err(RouteError::DefaultViolatesConstraint {
                pattern: uri.clone(),
                param: param.name.clone(),
                value: param.default.clone().unwrap_or_default(),
            });
        }
        for binding in &self.bindings {
            check(&binding.param, "binding")?;
            let optional_without_default = pattern
                .params()
                .any(|p| p.name == binding.param && p.optional && p.default.is_none());
            if optional_without_default {
                return Err(RouteError::MissingDefault {
                    pattern: uri.clone(),
                    param: binding.param.clone(),
                });
            }
        }

        let name = self.name.map(|n| format!("{}{n}", scope.name_prefix));

        let mut middleware = scope.middleware.clone();
        middleware.extend(self.middleware);
        let mut without_middleware = scope.without_middleware.clone();
        without_middleware.extend(self.without_middleware);

        Ok(Route {
            index,
            methods,
            pattern,
            domain,
            handler: self.handler,
            name,
            middleware,
            without_middleware,
            bindings: self.bindings,
            missing: self.missing,
            group: scope.snapshot(),
        })
    }
}

/// Group attributes captured when a route was registered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupSnapshot {
    /// Effective path prefix.
    pub prefix: String,
    /// Effective group domain.
    pub domain: Option<String>,
    /// Effective name prefix.
    pub name_prefix: String,
}

/// An immutable registered route.
#[derive(Debug, Clone)]
pub struct Route {
    index: usize,
    methods: MethodSet,
    pattern: PathPattern,
    domain: Option<DomainPattern>,
    handler: String,
    name: Option<String>,
    middleware: Vec<String>,
    without_middleware: Vec<String>,
    bindings: Vec<ParamBinding>,
    missing: MissingModel,
    group: GroupSnapshot,
}

impl Route {
    /// Position in the route table (registration order).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Accepted methods.
    #[must_use]
    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    /// The full path pattern including group prefixes.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.pattern.as_str()
    }

    /// Compiled path pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Compiled domain pattern, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&DomainPattern> {
        self.domain.as_ref()
    }

    /// Opaque handler identifier.
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Fully prefixed route name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Middleware references, group-inherited first.
    #[must_use]
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// Middleware names excluded from this route's chain.
    #[must_use]
    pub fn excluded_middleware(&self) -> &[String] {
        &self.without_middleware
    }

    /// Declared model bindings.
    #[must_use]
    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    /// Missing-model behavior.
    #[must_use]
    pub fn missing(&self) -> &MissingModel {
        &self.missing
    }

    /// Group attributes captured at registration.
    #[must_use]
    pub fn group(&self) -> &GroupSnapshot {
        &self.group
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.methods, self.uri())?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(def: RouteDefinition) -> Result<Route, RouteError> {
        def.compile(0, &GroupScope::default())
    }

    #[test]
    fn test_method_set_get_implies_head() {
        let set = MethodSet::new([Method::GET, Method::POST, Method::GET]);
        assert_eq!(set.as_slice(), &[Method::GET, Method::HEAD, Method::POST]);
        assert_eq!(set.to_string(), "GET|HEAD|POST");
    }

    #[test]
    fn test_compile_basic_route() {
        let route = compile(RouteDefinition::get("/users/{id}", "users.show").name("users.show")).unwrap();
        assert_eq!(route.uri(), "/users/{id}");
        assert_eq!(route.handler(), "users.show");
        assert_eq!(route.name(), Some("users.show"));
        assert!(route.methods().contains(&Method::HEAD));
        assert_eq!(route.to_string(), "GET|HEAD /users/{id} (users.show)");
    }

    #[test]
    fn test_compile_rejects_empty_methods() {
        let err = compile(RouteDefinition::new(Vec::new(), "/x", "h")).unwrap_err();
        assert!(matches!(err, RouteError::EmptyMethods { .. }));
    }

    #[test]
    fn test_compile_rejects_unknown_constraint_target() {
        let err = compile(RouteDefinition::get("/users/{id}", "h").where_number("user")).unwrap_err();
        assert!(matches!(err, RouteError::UnknownParam { rule: "constraint", .. }));
    }

    #[test]
    fn test_compile_rejects_unknown_binding_target() {
        let err = compile(RouteDefinition::get("/users/{id}", "h").bind("user", "user")).unwrap_err();
        assert!(matches!(err, RouteError::UnknownParam { rule: "binding", .. }));
    }

    #[test]
    fn test_binding_optional_param_requires_default() {
        let err = compile(RouteDefinition::get("/posts/{post?}", "h").bind("post", "post")).unwrap_err();
        assert!(matches!(err, RouteError::MissingDefault { .. }));

        let ok = compile(
            RouteDefinition::get("/posts/{post?}", "h")
                .default_value("post", "latest")
                .bind("post", "post"),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_default_must_satisfy_constraint() {
        let err = compile(
            RouteDefinition::get("/p/{id?}", "h")
                .where_number("id")
                .default_value("id", "abc"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RouteError::DefaultViolatesConstraint { ref param, ref value, .. }
                if param == "id" && value == "abc"
        ));

        let route = compile(
            RouteDefinition::get("/p/{id?}", "h")
                .where_number("id")
                .default_value("id", "1"),
        )
        .unwrap();
        assert_eq!(route.pattern().params().next().and_then(|p| p.default.as_deref()), Some("1"));
    }

    #[test]
    fn test_compile_rejects_param_shared_by_domain_and_path() {
        let err = compile(RouteDefinition::get("/{tenant}", "h").domain("{tenant}.example.com")).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { .. }));
    }

    #[test]
    fn test_any_route_accepts_standard_methods() {
        let route = compile(RouteDefinition::any("/hook", "hook")).unwrap();
        for method in ANY_METHODS {
            assert!(route.methods().contains(&method));
        }
        assert!(!route.methods().contains(&Method::TRACE));
    }
}
