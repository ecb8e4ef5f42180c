//! Service registry — look up optional infrastructure by interface type.
//!
//! Services are registered once at application setup and shared read-only
//! across requests. Views reach them through
//! [`Request::find_service`](crate::http::Request::find_service), which
//! resolves the registry attached to the request by the router.
//!
//! Interfaces are usually trait objects, so the registry is keyed on the
//! [`TypeId`] of the (possibly unsized) interface type and stores an
//! `Arc<T>` for it:
//!
//! ```
//! use std::sync::Arc;
//! use origin_cache::services::ServiceRegistry;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_owned()
//!     }
//! }
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register::<dyn Greeter>(Arc::new(English));
//!
//! let greeter = registry.find::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use thiserror::Error;

/// Errors returned by service lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Nothing is registered for the requested interface.
    #[error("no service registered for {interface}")]
    NotFound { interface: &'static str },
}

/// Type-keyed registry of shared services.
#[derive(Default)]
pub struct ServiceRegistry {
    // Each value is a boxed `Arc<T>` where `T` is the interface keyed by `TypeId::of::<T>()`.
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` as the implementation of interface `T`.
    ///
    /// A later registration for the same interface replaces the earlier one.
    pub fn register<T>(&mut self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        tracing::debug!(interface = type_name::<T>(), "service registered");
        self.map.insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Look up the implementation registered for interface `T`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when no service was registered for `T`.
    pub fn find<T>(&self) -> Result<Arc<T>, LookupError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|service| service.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or(LookupError::NotFound {
                interface: type_name::<T>(),
            })
    }

    /// Returns `true` if an implementation is registered for interface `T`.
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Remove the implementation registered for interface `T`, returning `true` if one existed.
    pub fn remove<T>(&mut self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    /// Number of registered interfaces.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter: Send + Sync {
        fn count(&self) -> usize;
    }

    struct Fixed(usize);

    impl Counter for Fixed {
        fn count(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn find_missing_is_not_found() {
        let registry = ServiceRegistry::new();
        let Err(err) = registry.find::<dyn Counter>() else {
            panic!("expected NotFound for an unregistered interface");
        };
        assert!(matches!(err, LookupError::NotFound { interface } if interface.contains("Counter")));
    }

    #[test]
    fn register_and_find_trait_object() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Counter>(Arc::new(Fixed(3)));
        assert_eq!(registry.find::<dyn Counter>().unwrap().count(), 3);
        assert!(registry.contains::<dyn Counter>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concrete_and_interface_keys_are_distinct() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Fixed(1)));
        assert!(registry.find::<dyn Counter>().is_err());
        assert_eq!(registry.find::<Fixed>().unwrap().0, 1);
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Counter>(Arc::new(Fixed(1)));
        registry.register::<dyn Counter>(Arc::new(Fixed(2)));
        assert_eq!(registry.find::<dyn Counter>().unwrap().count(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Counter>(Arc::new(Fixed(1)));
        assert!(registry.remove::<dyn Counter>());
        assert!(registry.is_empty());
        assert!(!registry.remove::<dyn Counter>()); // already gone
    }
}
