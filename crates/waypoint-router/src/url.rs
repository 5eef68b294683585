//! Reverse routing: building URLs from route names.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::UnresolvedRoute;
use crate::pattern::{Param, Segment};
use crate::route::Route;
use crate::table::RouteTable;

/// Characters left unescaped in a path segment or query component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

impl RouteTable {
    /// Builds the path of a named route.
    ///
    /// Missing optional parameters are omitted (their default is not
    /// substituted). An empty value counts as missing, since an empty path
    /// segment never matches. Parameters of the route's domain pattern are
    /// left out of the path form. Any other parameter the route does not
    /// declare is appended as a query string in the order given.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waypoint_router::{RouteDefinition, RouteTable};
    ///
    /// let mut table = RouteTable::new();
    /// table.register(RouteDefinition::get("/users/{id}", "users.show").name("users.show"))?;
    ///
    /// let url = table.url_for("users.show", &[("id", "7"), ("tab", "posts")]).unwrap();
    /// assert_eq!(url, "/users/7?tab=posts");
    /// # Ok::<(), waypoint_router::RouteError>(())
    /// ```
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UnresolvedRoute> {
        let route = self
            .by_name(name)
            .ok_or_else(|| UnresolvedRoute::UnknownName {
                name: name.to_string(),
            })?;

        let mut used: Vec<&str> = route
            .domain()
            .map(|domain| domain.params().map(|param| param.name.as_str()).collect())
            .unwrap_or_default();
        let path = build_path(route, name, params, &mut used)?;
        Ok(append_query(path, params, &used))
    }

    /// Builds an absolute URL for a named route.
    ///
    /// Routes with a domain pattern have their host parameters filled from
    /// `params`; routes without one use `default_host`.
    pub fn absolute_url_for(
        &self,
        name: &str,
        params: &[(&str, &str)],
        scheme: &str,
        default_host: &str,
    ) -> Result<String, UnresolvedRoute> {
        let route = self
            .by_name(name)
            .ok_or_else(|| UnresolvedRoute::UnknownName {
                name: name.to_string(),
            })?;

        let mut used = Vec::new();
        let host = match route.domain() {
            Some(domain) => {
                let mut labels = Vec::with_capacity(domain.segments().len());
                for segment in domain.segments() {
                    match segment {
                        Segment::Literal(literal) => labels.push(literal.clone()),
                        Segment::Param(param) => {
                            let value = required_value(param, name, params)?;
                            used.push(param.name.as_str());
                            labels.push(value.to_string());
                        }
                    }
                }
                labels.join(".")
            }
            None => default_host.to_string(),
        };

        let path = build_path(route, name, params, &mut used)?;
        Ok(format!("{scheme}://{host}{}", append_query(path, params, &used)))
    }
}

fn lookup<'p>(params: &[(&'p str, &'p str)], name: &str) -> Option<&'p str> {
    params
        .iter()
        .find(|(k, _)| *k == name)
        .map(|&(_, v)| v)
        .filter(|v| !v.is_empty())
}

fn required_value<'p>(
    param: &Param,
    route: &str,
    params: &[(&'p str, &'p str)],
) -> Result<&'p str, UnresolvedRoute> {
    let value = lookup(params, &param.name).ok_or_else(|| UnresolvedRoute::MissingParameter {
        name: route.to_string(),
        param: param.name.clone(),
    })?;
    check_constraint(param, route, value)?;
    Ok(value)
}

fn check_constraint(param: &Param, route: &str, value: &str) -> Result<(), UnresolvedRoute> {
    if param.accepts(value) {
        Ok(())
    } else {
        Err(UnresolvedRoute::ConstraintViolation {
            name: route.to_string(),
            param: param.name.clone(),
            value: value.to_string(),
        })
    }
}

fn build_path<'r>(
    route: &'r Route,
    name: &str,
    params: &[(&str, &str)],
    used: &mut Vec<&'r str>,
) -> Result<String, UnresolvedRoute> {
    let mut path = String::new();
    for segment in route.pattern().segments() {
        match segment {
            Segment::Literal(literal) => {
                path.push('/');
                path.push_str(&encode(literal));
            }
            Segment::Param(param) if param.optional => {
                // Optional segments are trailing, so stop at the first gap.
                let Some(value) = lookup(params, &param.name) else {
                    break;
                };
                check_constraint(param, name, value)?;
                used.push(param.name.as_str());
                path.push('/');
                path.push_str(&encode(value));
            }
            Segment::Param(param) => {
                let value = required_value(param, name, params)?;
                used.push(param.name.as_str());
                path.push('/');
                path.push_str(&encode(value));
            }
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    Ok(path)
}

fn append_query(mut path: String, params: &[(&str, &str)], used: &[&str]) -> String {
    let mut first = true;
    for (key, value) in params.iter().filter(|(k, _)| !used.contains(k)) {
        path.push(if first { '?' } else { '&' });
        first = false;
        path.push_str(&encode(key));
        path.push('=');
        path.push_str(&encode(value));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GroupAttributes, RouteDefinition};

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table
            .register(
                RouteDefinition::get("/users/{id}/posts/{post?}", "posts.show")
                    .name("posts.show")
                    .where_number("id"),
            )
            .unwrap();
        table
            .register(RouteDefinition::get("/", "home").name("home"))
            .unwrap();
        table
            .group(
                GroupAttributes::new().domain("{account}.example.com").name("tenant."),
                |t| {
                    t.register(RouteDefinition::get("/dashboard", "dash").name("dashboard"))?;
                    Ok(())
                },
            )
            .unwrap();
        table
    }

    #[test]
    fn test_url_for_fills_params() {
        let url = table().url_for("posts.show", &[("id", "1"), ("post", "hello")]).unwrap();
        assert_eq!(url, "/users/1/posts/hello");
    }

    #[test]
    fn test_url_for_omits_missing_optional() {
        let url = table().url_for("posts.show", &[("id", "1")]).unwrap();
        assert_eq!(url, "/users/1/posts");
    }

    #[test]
    fn test_url_for_extra_params_become_query() {
        let url = table()
            .url_for("posts.show", &[("id", "1"), ("page", "2"), ("q", "a b")])
            .unwrap();
        assert_eq!(url, "/users/1/posts?page=2&q=a%20b");
    }

    #[test]
    fn test_url_for_encodes_values() {
        let url = table().url_for("posts.show", &[("id", "1"), ("post", "a/b")]).unwrap();
        assert_eq!(url, "/users/1/posts/a%2Fb");
    }

    #[test]
    fn test_url_for_root() {
        assert_eq!(table().url_for("home", &[]).unwrap(), "/");
    }

    #[test]
    fn test_url_for_unknown_name() {
        let err = table().url_for("nope", &[]).unwrap_err();
        assert!(matches!(err, UnresolvedRoute::UnknownName { .. }));
    }

    #[test]
    fn test_url_for_missing_required() {
        let err = table().url_for("posts.show", &[]).unwrap_err();
        assert_eq!(
            err,
            UnresolvedRoute::MissingParameter {
                name: "posts.show".to_string(),
                param: "id".to_string(),
            }
        );
    }

    #[test]
    fn test_url_for_empty_required_is_missing() {
        let mut table = RouteTable::new();
        table
            .register(RouteDefinition::get("/users/{id}/posts", "posts.index").name("p"))
            .unwrap();

        let err = table.url_for("p", &[("id", "")]).unwrap_err();
        assert_eq!(
            err,
            UnresolvedRoute::MissingParameter {
                name: "p".to_string(),
                param: "id".to_string(),
            }
        );
        assert!(table.url_for("p", &[("id", "5")]).is_ok());
    }

    #[test]
    fn test_url_for_empty_optional_is_omitted() {
        let url = table().url_for("posts.show", &[("id", "1"), ("post", "")]).unwrap();
        assert_eq!(url, "/users/1/posts");
        assert!(table().match_route(&http::Method::GET, None, &url).is_ok());
    }

    #[test]
    fn test_url_for_keeps_domain_params_out_of_query() {
        let url = table()
            .url_for("tenant.dashboard", &[("account", "acme"), ("tab", "usage")])
            .unwrap();
        assert_eq!(url, "/dashboard?tab=usage");
    }

    #[test]
    fn test_url_for_constraint_violation() {
        let err = table().url_for("posts.show", &[("id", "abc")]).unwrap_err();
        assert!(matches!(err, UnresolvedRoute::ConstraintViolation { ref value, .. } if value == "abc"));
    }

    #[test]
    fn test_absolute_url_with_domain() {
        let url = table()
            .absolute_url_for("tenant.dashboard", &[("account", "acme")], "https", "localhost")
            .unwrap();
        assert_eq!(url, "https://acme.example.com/dashboard");
    }

    #[test]
    fn test_absolute_url_default_host() {
        let url = table()
            .absolute_url_for("posts.show", &[("id", "3")], "http", "localhost:8080")
            .unwrap();
        assert_eq!(url, "http://localhost:8080/users/3/posts");
    }

    #[test]
    fn test_url_round_trips_through_matcher() {
        let table = table();
        let url = table.url_for("posts.show", &[("id", "9"), ("post", "caf\u{e9}")]).unwrap();
        let found = table.match_route(&http::Method::GET, None, &url).unwrap();
        assert_eq!(found.route.name(), Some("posts.show"));
        assert_eq!(found.param("post"), Some("caf\u{e9}"));
    }
}
