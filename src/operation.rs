use axum::http::Method;

/// Metadata describing one API endpoint.
///
/// An `Operation` is produced by the API side and handed to an
/// [`Adapter`](crate::Adapter) at registration time. The adapter reads the
/// method and path to build a route and keeps the operation behind an `Arc`
/// so every request on that route can see it through
/// [`Context::operation`](crate::Context::operation).
///
/// Paths use the `{name}` placeholder syntax for path parameters.
///
/// # Examples
///
/// ```
/// use apibind::Operation;
/// use axum::http::Method;
///
/// let op = Operation::new(Method::GET, "/items/{id}")
///     .with_summary("Fetch a single item")
///     .with_tag("items");
///
/// assert_eq!(op.operation_id, "get-items-by-id");
/// assert_eq!(op.path_params().collect::<Vec<_>>(), vec!["id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// HTTP method the operation answers to
    pub method: Method,
    /// Route path, with `{name}` path parameters
    pub path: String,
    /// Unique identifier of the operation
    pub operation_id: String,
    /// Short human-readable summary
    pub summary: Option<String>,
    /// Longer description
    pub description: Option<String>,
    /// Grouping tags
    pub tags: Vec<String>,
}

impl Operation {
    /// Creates an operation for `method` and `path`.
    ///
    /// The operation id is derived from the method and path, see
    /// [`generate_operation_id`].
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            operation_id: generate_operation_id(&method, &path),
            method,
            path,
            summary: None,
            description: None,
            tags: Vec::new(),
        }
    }

    /// Replaces the generated operation id.
    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = id.into();
        self
    }

    /// Sets the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Iterates over the names of the `{name}` path parameters, in path order.
    pub fn path_params(&self) -> impl Iterator<Item = &str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
    }
}

/// Derives an operation id from a method and a path.
///
/// The result is lowercase, words are joined with `-`, and each `{name}`
/// parameter becomes `by-name`:
///
/// ```
/// use apibind::generate_operation_id;
/// use axum::http::Method;
///
/// assert_eq!(generate_operation_id(&Method::GET, "/items/{id}"), "get-items-by-id");
/// assert_eq!(generate_operation_id(&Method::POST, "/users"), "post-users");
/// ```
pub fn generate_operation_id(method: &Method, path: &str) -> String {
    let mut words = vec![method.as_str().to_ascii_lowercase()];

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(param) => {
                words.push("by".to_string());
                words.push(slug(param));
            }
            None => words.push(slug(segment)),
        }
    }

    words.retain(|w| !w.is_empty());
    words.join("-")
}

fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_operation_id() {
        let op = Operation::new(Method::GET, "/items/{id}");
        assert_eq!(op.operation_id, "get-items-by-id");
        assert!(op.summary.is_none());
        assert!(op.tags.is_empty());
    }

    #[test]
    fn operation_id_can_be_overridden() {
        let op = Operation::new(Method::DELETE, "/items/{id}").with_operation_id("remove-item");
        assert_eq!(op.operation_id, "remove-item");
    }

    #[test]
    fn operation_id_for_root_path() {
        assert_eq!(generate_operation_id(&Method::GET, "/"), "get");
    }

    #[test]
    fn operation_id_slugs_punctuation() {
        assert_eq!(
            generate_operation_id(&Method::PUT, "/user_profiles/{user_id}/avatar.png"),
            "put-user-profiles-by-user-id-avatar-png"
        );
    }

    #[test]
    fn path_params_in_order() {
        let op = Operation::new(Method::GET, "/orgs/{org}/repos/{repo}");
        assert_eq!(op.path_params().collect::<Vec<_>>(), vec!["org", "repo"]);
    }

    #[test]
    fn path_params_empty_without_placeholders() {
        let op = Operation::new(Method::GET, "/health");
        assert_eq!(op.path_params().count(), 0);
    }

    #[test]
    fn builder_methods_set_fields() {
        let op = Operation::new(Method::POST, "/items")
            .with_summary("Create")
            .with_description("Creates an item")
            .with_tag("items")
            .with_tag("write");

        assert_eq!(op.summary.as_deref(), Some("Create"));
        assert_eq!(op.description.as_deref(), Some("Creates an item"));
        assert_eq!(op.tags, vec!["items".to_string(), "write".to_string()]);
    }
}
