//! Provider - The contract between the planning pipeline and real infrastructure
//!
//! A Provider knows how to read, create, update and delete the resource types
//! it declares. All remote identifiers flow through here: `create` returns the
//! identifier it assigned, and `read`/`update`/`delete` receive it back.

use std::collections::HashMap;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State, Value};
pub use crate::schema::ResourceSchema;

/// Error returned by Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    /// Attach the resource this error belongs to
    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    /// Attach an underlying cause
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn Error + 'static))
    }
}

/// Result type for Provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed future used by the Provider trait for dyn-compatibility
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A resource type a Provider can manage
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "cynosdb.cluster")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }
}

/// Interface to real infrastructure
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "tencentcloud")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// If an identifier is provided, use it to read the resource directly.
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the remote ID
    /// (e.g., "cynosdbmysql-bzs467r3")
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource identified by its remote ID
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource identified by its remote ID
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Run a data source query
    ///
    /// Unlike `read`, the full resource is passed in because the query
    /// arguments (filters, regions, keywords) live in its attributes.
    fn query(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }

    fn query(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).query(resource)
    }
}

/// Populate a state attribute only when the response carried the field.
///
/// API response fields are all optional; an absent field must be omitted
/// from the attribute map, never written as a zero value.
pub fn set_optional<T, F>(attrs: &mut HashMap<String, Value>, key: &str, field: Option<T>, convert: F)
where
    F: FnOnce(T) -> Value,
{
    if let Some(value) = field {
        attrs.insert(key.to_string(), convert(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let identifier = identifier.to_string();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier(identifier)) })
        }

        fn delete(&self, _id: &ResourceId, _identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn query(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider = MockProvider;
        let id = ResourceId::new("cynosdb.cluster", "main");

        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_identifier() {
        let provider = MockProvider;
        let resource = Resource::new("cynosdb.cluster", "main")
            .with_attribute("cluster_name", Value::String("demo".to_string()));

        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("mock-id-123"));
    }

    #[tokio::test]
    async fn boxed_provider_dispatches() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        assert_eq!(provider.name(), "mock");

        let id = ResourceId::new("cynosdb.account", "app");
        let state = provider.read(&id, Some("cynosdbmysql-x#app#%")).await.unwrap();
        assert!(!state.exists);
    }

    #[test]
    fn provider_error_display_includes_resource() {
        let err = ProviderError::new("Failed to describe cluster")
            .for_resource(ResourceId::new("cynosdb.cluster", "main"));
        assert_eq!(err.to_string(), "[cynosdb.cluster.main] Failed to describe cluster");

        let bare = ProviderError::new("missing credential");
        assert_eq!(bare.to_string(), "missing credential");
    }

    #[test]
    fn provider_error_source_chain() {
        let io = std::io::Error::other("socket closed");
        let err = ProviderError::new("Failed to call API").with_cause(io);
        assert!(err.source().is_some());
    }

    #[test]
    fn set_optional_skips_absent_fields() {
        let mut attrs = HashMap::new();
        set_optional(&mut attrs, "cluster_name", Some("demo".to_string()), Value::String);
        set_optional(&mut attrs, "project_id", None::<i64>, Value::Int);

        assert_eq!(attrs.get("cluster_name"), Some(&Value::String("demo".to_string())));
        assert!(!attrs.contains_key("project_id"));
    }
}
