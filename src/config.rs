/// Top-level description of an API instance.
///
/// Passed to [`web::new`](crate::web::new) together with the router and kept
/// by the resulting [`Api`](crate::Api) for the lifetime of the server.
///
/// # Examples
///
/// ```
/// use apibind::Config;
///
/// let config = Config::new("Inventory", "1.2.0").with_description("Stock levels");
/// assert_eq!(config.title, "Inventory");
/// assert_eq!(config.description.as_deref(), Some("Stock levels"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API title
    pub title: String,
    /// API version string
    pub version: String,
    /// Optional long-form description
    pub description: Option<String>,
}

impl Config {
    /// Creates a config with the given title and version.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("API", "1.0.0")
    }
}
