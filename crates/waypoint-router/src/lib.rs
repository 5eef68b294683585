//! Ordered route table for Waypoint.
//!
//! This crate owns route registration and lookup:
//!
//! - **Registration**: [`RouteDefinition`] builders compiled into immutable
//!   [`Route`]s, with group scopes ([`GroupAttributes`]) merged in.
//! - **Matching**: first registered route whose domain, path and method all
//!   match wins. A path that matches with the wrong method yields a 405 with
//!   the union of allowed methods.
//! - **Reverse routing**: [`RouteTable::url_for`] and
//!   [`RouteTable::absolute_url_for`].
//!
//! # Example
//!
//! ```rust
//! use waypoint_router::{MatchError, RouteDefinition, RouteTable};
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.register(RouteDefinition::get("/users/{id}", "users.show").where_number("id"))?;
//! table.post("/users", "users.store")?;
//!
//! let found = table.match_route(&Method::GET, None, "/users/42").unwrap();
//! assert_eq!(found.route.handler(), "users.show");
//! assert_eq!(found.param("id"), Some("42"));
//!
//! let miss = table.match_route(&Method::DELETE, None, "/users").unwrap_err();
//! assert!(matches!(miss, MatchError::MethodNotAllowed { .. }));
//! # Ok::<(), waypoint_router::RouteError>(())
//! ```
//!
//! # Pattern syntax
//!
//! ```text
//! /users/{id}            required parameter
//! /posts/{slug?}         optional parameter (trailing only)
//! {account}.example.com  domain parameter
//! ```

mod error;
mod group;
mod params;
mod pattern;
mod route;
mod table;
mod url;

pub use error::{MatchError, RouteError, UnresolvedRoute};
pub use group::GroupAttributes;
pub use params::Params;
pub use pattern::{Constraint, DomainPattern, Param, PathPattern, Segment};
pub use route::{
    GroupSnapshot, MethodSet, MissingModel, ParamBinding, Route, RouteDefinition, ANY_METHODS,
};
pub use table::{RouteMatch, RouteTable};

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_registration_order_is_preserved() {
        let mut table = RouteTable::new();
        for i in 0..5 {
            table.get(&format!("/r{i}"), &format!("h{i}")).unwrap();
        }
        let indexes: Vec<_> = table.routes().iter().map(|r| r.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_group_without_middleware_is_inherited() {
        let mut table = RouteTable::new();
        table
            .group(
                GroupAttributes::new()
                    .middleware(["web"])
                    .without_middleware(["csrf"]),
                |g| {
                    g.register(RouteDefinition::post("/hook", "hook").without_middleware(["session"]))?;
                    Ok(())
                },
            )
            .unwrap();
        let route = &table.routes()[0];
        assert_eq!(route.middleware(), &["web"]);
        assert_eq!(route.excluded_middleware(), &["csrf", "session"]);
    }

    #[test]
    fn test_binding_metadata_survives_registration() {
        let mut table = RouteTable::new();
        let route = table
            .register(
                RouteDefinition::get("/users/{user}", "users.show")
                    .bind("user", "user")
                    .missing(MissingModel::Redirect("/users".to_string())),
            )
            .unwrap();
        assert_eq!(route.bindings()[0].tag, "user");
        assert_eq!(route.missing(), &MissingModel::Redirect("/users".to_string()));
    }

    #[test]
    fn test_matches_are_independent_of_earlier_failed_candidates() {
        let mut table = RouteTable::new();
        table
            .register(RouteDefinition::get("/a/{x}/{y}", "first").where_number("y"))
            .unwrap();
        table.get("/a/{z}/{w}", "second").unwrap();

        let found = table.match_route(&Method::GET, None, "/a/1/b").unwrap();
        assert_eq!(found.route.handler(), "second");
        assert_eq!(found.params.names().collect::<Vec<_>>(), vec!["z", "w"]);
    }
}
