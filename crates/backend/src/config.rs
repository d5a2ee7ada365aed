//! Backend connection configuration.

/// Connection settings for the hosted backend. Constructed explicitly by the
/// host application; nothing here reads the environment.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (e.g. "https://project.backend.example").
    pub base_url: String,
    /// Project API key sent on every request.
    pub api_key: String,
    /// Database schema the REST layer resolves tables against, selected via
    /// the `Accept-Profile`/`Content-Profile` headers.
    pub schema: String,
}

impl BackendConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            schema: "public".to_string(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}
