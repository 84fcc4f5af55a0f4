//! The `route` transform assigns events to named routes.
//!
//! Routes are tried in order and the first match is written to the event's
//! `metadata.route`. Sinks can then select a route. Events matching no route
//! are dropped, or tagged [`UNMATCHED_ROUTE`] when `reroute_unmatched` is set.

use super::condition::{validate_condition, Condition};
use super::{Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::Event;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Kind name.
pub const KIND: &str = "route";

/// Route name given to unmatched events.
pub const UNMATCHED_ROUTE: &str = "_unmatched";

/// A named condition.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    /// The route name.
    #[validate(length(min = 1, message = "Route name cannot be empty"))]
    pub name: String,

    /// Events matching this condition take the route.
    #[validate(custom(function = "validate_condition"))]
    pub condition: Condition,
}

/// Options of the `route` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RouteOptions {
    /// Routes, in priority order.
    #[validate(length(min = 1, message = "route needs at least one route"), nested)]
    pub routes: Vec<RouteRule>,

    /// Keep unmatched events on the `_unmatched` route.
    #[serde(default)]
    pub reroute_unmatched: bool,
}

/// Tags events with the first matching route.
#[derive(Debug, Clone)]
pub struct Route {
    routes: Vec<RouteRule>,
    reroute_unmatched: bool,
}

impl Route {
    /// Creates a router.
    ///
    /// # Errors
    ///
    /// Returns a message if a route uses the reserved unmatched name or two
    /// routes share a name.
    pub fn new(routes: Vec<RouteRule>, reroute_unmatched: bool) -> Result<Self, String> {
        for (index, rule) in routes.iter().enumerate() {
            if rule.name == UNMATCHED_ROUTE {
                return Err(format!("route name '{UNMATCHED_ROUTE}' is reserved"));
            }
            if routes[..index].iter().any(|other| other.name == rule.name) {
                return Err(format!("duplicate route name '{}'", rule.name));
            }
        }
        Ok(Self {
            routes,
            reroute_unmatched,
        })
    }
}

impl Transform for Route {
    fn process(&self, mut event: Event) -> Result<Vec<Event>, TransformError> {
        let route = self
            .routes
            .iter()
            .find(|rule| rule.condition.matches(&event))
            .map(|rule| rule.name.as_str())
            .or(self.reroute_unmatched.then_some(UNMATCHED_ROUTE));

        match route {
            Some(name) => {
                event.metadata_mut().route = Some(name.to_string());
                Ok(vec![event])
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Builds a `route` step.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] if the routes are malformed.
pub fn build(
    config: &TransformConfig,
    _registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    let options: RouteOptions = config.parse_options()?;
    let route = Route::new(options.routes, options.reroute_unmatched).map_err(|reason| {
        ConfigError::InvalidOptions {
            kind: config.kind.clone(),
            reason,
        }
    })?;
    Ok(Box::new(route))
}
