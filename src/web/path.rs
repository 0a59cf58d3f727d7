//! Route path translation.

/// Translates an operation path into axum's route syntax.
///
/// Whole-segment `{name}` placeholders become `:name` captures. Segments
/// already written in axum syntax, and literal segments, pass through
/// unchanged.
///
/// ```
/// use apibind::web::route_path;
///
/// assert_eq!(route_path("/items/{id}"), "/items/:id");
/// assert_eq!(route_path("/orgs/{org}/repos/{repo}"), "/orgs/:org/repos/:repo");
/// assert_eq!(route_path("/items/:id"), "/items/:id");
/// ```
pub fn route_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match placeholder(segment) {
            Some(name) => format!(":{name}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn placeholder(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix('{')?.strip_suffix('}')?;
    (!name.is_empty()).then_some(name)
}
