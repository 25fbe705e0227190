//! Request-scoped values handed to the executable schema.
//!
//! [`TypedContext`] is the caller-supplied context, keyed by `TypeId`.
//! [`RootValue`] is the root object derived from transport metadata.

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A type-safe storage for request-scoped data.
///
/// # Example
///
/// ```
/// use gqlhttp::context::TypedContext;
///
/// #[derive(Clone)]
/// struct TenantId(String);
///
/// let mut ctx = TypedContext::new();
/// ctx.insert(TenantId("acme".into()));
///
/// let tenant: Option<&TenantId> = ctx.get();
/// assert_eq!(tenant.unwrap().0, "acme");
/// ```
#[derive(Default)]
pub struct TypedContext {
    data: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
    headers: HashMap<String, String>,
}

impl TypedContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value into the context.
    ///
    /// If a value of the same type already exists, it is replaced and returned.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Gets a reference to a value by type.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Removes a value by type.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Returns true if the context contains a value of the given type.
    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    /// Sets a header value. Names are stored lowercased.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Gets a header value, matching the name case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

impl fmt::Debug for TypedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedContext")
            .field("data_count", &self.data.len())
            .field("headers", &self.headers)
            .finish()
    }
}

/// Extension trait for building contexts with a fluent API.
pub trait ContextExt {
    /// Adds a value to the context and returns self.
    #[must_use]
    fn with<T: Send + Sync + 'static>(self, value: T) -> Self;

    /// Adds a header and returns self.
    #[must_use]
    fn with_header(self, key: impl Into<String>, value: impl Into<String>) -> Self;
}

impl ContextExt for TypedContext {
    fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }
}

/// Root value passed to the schema alongside the context.
///
/// Carries the raw `Authorization` header so resolvers can authenticate
/// without the handler interpreting the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootValue {
    /// Raw `Authorization` header value, empty when the header is absent.
    pub authorization: String,
}

impl RootValue {
    /// Creates a root value carrying the given credential.
    pub fn new(authorization: impl Into<String>) -> Self {
        Self {
            authorization: authorization.into(),
        }
    }

    /// Returns the credential, or `None` when the header was absent or empty.
    pub fn authorization(&self) -> Option<&str> {
        if self.authorization.is_empty() {
            None
        } else {
            Some(&self.authorization)
        }
    }

    /// Returns the token following a `Bearer ` scheme prefix, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        let (scheme, token) = self.authorization.split_once(' ')?;
        if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
            Some(token.trim())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct UserId(String);

    #[derive(Debug, Clone, PartialEq)]
    struct Roles(Vec<String>);

    #[test]
    fn test_typed_context_basic() {
        let mut ctx = TypedContext::new();
        ctx.insert(UserId("user_123".into()));
        ctx.insert(Roles(vec!["admin".into()]));

        assert_eq!(ctx.get::<UserId>().unwrap().0, "user_123");
        assert_eq!(ctx.get::<Roles>().unwrap().0, vec!["admin".to_string()]);
        assert!(ctx.get::<String>().is_none());
    }

    #[test]
    fn test_typed_context_replace_and_remove() {
        let mut ctx = TypedContext::new();
        ctx.insert(UserId("old".into()));
        let old = ctx.insert(UserId("new".into()));
        assert_eq!(old, Some(UserId("old".into())));

        assert_eq!(ctx.remove::<UserId>(), Some(UserId("new".into())));
        assert!(!ctx.contains::<UserId>());
    }

    #[test]
    fn test_context_ext_fluent_headers() {
        let ctx = TypedContext::new()
            .with(UserId("123".into()))
            .with_header("X-Request-Id", "abc");

        assert!(ctx.contains::<UserId>());
        assert_eq!(ctx.header("x-request-id"), Some("abc"));
        assert_eq!(ctx.header("X-REQUEST-ID"), Some("abc"));
    }

    #[test]
    fn test_root_value_authorization() {
        assert_eq!(RootValue::default().authorization(), None);
        assert_eq!(RootValue::new("Basic abc").authorization(), Some("Basic abc"));
    }

    #[test]
    fn test_root_value_bearer_token() {
        assert_eq!(RootValue::new("Bearer tok").bearer_token(), Some("tok"));
        assert_eq!(RootValue::new("bearer  tok ").bearer_token(), Some("tok"));
        assert_eq!(RootValue::new("Basic abc").bearer_token(), None);
        assert_eq!(RootValue::new("Bearer").bearer_token(), None);
        assert_eq!(RootValue::default().bearer_token(), None);
    }
}
