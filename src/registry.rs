//! A thread-safe registry of lazily constructed singletons.
//!
//! Each key moves through three states: absent, constructing (one thread is
//! running the factory) and published. Publication is terminal. A failed or
//! panicking factory returns the key to absent, so a later call can retry.
//!
//! Lookups of published instances only take a shared read lock. Construction
//! is coordinated by one mutex and a condition variable, and the factory itself
//! runs outside of both locks, so keys never wait on each other's factories.
//!
//! # Examples
//!
//! ```
//! use singleton_pool::{BoundedPool, SingletonRegistry};
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! let registry = SingletonRegistry::new();
//!
//! let pool: Arc<BoundedPool> = registry
//!     .get_instance("connectors", || Ok::<_, Infallible>(BoundedPool::new(5)))
//!     .unwrap();
//! assert_eq!(pool.acquire().unwrap().unit(), 5);
//!
//! // The factory of a published key is never called again.
//! let same: Arc<BoundedPool> = registry
//!     .get_instance("connectors", || -> Result<BoundedPool, Infallible> { unreachable!() })
//!     .unwrap();
//! assert!(Arc::ptr_eq(&pool, &same));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use crate::{BoxError, RegistryError, RegistryEvent};

type Instance = Arc<dyn Any + Send + Sync>;

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives every [`RegistryEvent`] emitted by one registry. It is
/// invoked without any registry lock held.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

/// Registry that constructs at most one instance per key.
///
/// The registry is an ordinary value: build it once at startup and share it by
/// reference or `Arc`. Independent registries never see each other's keys.
pub struct SingletonRegistry<K = &'static str> {
    published: RwLock<HashMap<K, Instance>>,
    // Keys whose factory is running, with the thread running it.
    constructing: Mutex<HashMap<K, ThreadId>>,
    construction_done: Condvar,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl<K> SingletonRegistry<K> {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(HashMap::new()),
            constructing: Mutex::new(HashMap::new()),
            construction_done: Condvar::new(),
            trace: Mutex::new(None),
        }
    }

    /// Sets a tracing callback that will be invoked on registry events.
    ///
    /// Replaces any previous callback. The fast path of
    /// [`get_instance`](Self::get_instance) emits no events.
    ///
    /// # Example
    /// ```rust
    /// use singleton_pool::SingletonRegistry;
    ///
    /// let registry: SingletonRegistry = SingletonRegistry::new();
    /// registry.set_trace_callback(|event| println!("[registry-trace] {}", event));
    /// ```
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clears the tracing callback (disables registry tracing).
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    /// Emits an event to the current callback, if any. The event is only built
    /// when somebody listens.
    fn emit_event(&self, event: impl FnOnce() -> RegistryEvent) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(&event());
        }
    }

    /// Number of published instances.
    pub fn len(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> SingletonRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Returns the instance published for `key`, constructing it with `factory`
    /// if the key is absent.
    ///
    /// Concurrent callers for the same key block until the winning thread's
    /// factory finishes; exactly one of them runs its factory. A published key
    /// never runs a factory again.
    ///
    /// The factory must not ask this registry for the key it is building.
    /// Doing so fails with [`RegistryError::Reentrant`] instead of deadlocking.
    /// Other keys may be requested freely.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::ConstructionFailed`] if the factory returned an error.
    ///   Nothing is cached, the next call runs a factory again.
    /// - [`RegistryError::Reentrant`] if called from the key's own factory.
    /// - [`RegistryError::TypeMismatch`] if the key holds a different type.
    ///
    /// # Panics
    ///
    /// A panic in the factory propagates to the caller. The key is left absent
    /// and waiting threads are woken.
    pub fn get_instance<T, E, F>(&self, key: K, factory: F) -> Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(instance) = self.published_instance(&key) {
            trace!(key = ?key, "instance already published");
            return downcast(&key, instance);
        }

        let me = thread::current().id();
        let mut constructing = self.lock_constructing();
        let mut announced_wait = false;

        loop {
            // Re-check under the lock: another thread may have published while
            // we were acquiring it.
            if let Some(instance) = self.published_instance(&key) {
                drop(constructing);
                return downcast(&key, instance);
            }

            match constructing.get(&key).copied() {
                None => break,
                Some(owner) if owner == me => {
                    drop(constructing);
                    warn!(key = ?key, "factory re-entered the registry for its own key");
                    self.emit_event(|| RegistryEvent::Reentered {
                        key: format!("{:?}", key),
                    });
                    return Err(RegistryError::Reentrant {
                        key: format!("{:?}", key),
                    });
                }
                Some(_) if !announced_wait => {
                    // Announce outside the lock, then look again before waiting.
                    announced_wait = true;
                    drop(constructing);
                    debug!(key = ?key, "waiting for construction on another thread");
                    self.emit_event(|| RegistryEvent::Wait {
                        key: format!("{:?}", key),
                    });
                    constructing = self.lock_constructing();
                }
                Some(_) => {
                    constructing = self
                        .construction_done
                        .wait(constructing)
                        .unwrap_or_else(|p| p.into_inner());
                }
            }
        }

        constructing.insert(key.clone(), me);
        drop(constructing);

        // Armed before anything user-supplied runs, trace callback included.
        let pending = PendingConstruction {
            registry: self,
            key: &key,
            armed: true,
        };

        let type_name = std::any::type_name::<T>();
        debug!(key = ?key, type_name, "constructing instance");
        self.emit_event(|| RegistryEvent::Construct {
            key: format!("{:?}", key),
            type_name,
        });

        match factory() {
            Ok(value) => {
                let instance = Arc::new(value);
                pending.publish(instance.clone());

                debug!(key = ?key, type_name, "published instance");
                self.emit_event(|| RegistryEvent::Publish {
                    key: format!("{:?}", key),
                    type_name,
                });
                Ok(instance)
            }
            Err(err) => {
                drop(pending);
                let source: BoxError = err.into();

                warn!(key = ?key, error = %source, "instance construction failed");
                self.emit_event(|| RegistryEvent::ConstructionFailed {
                    key: format!("{:?}", key),
                });
                Err(RegistryError::ConstructionFailed {
                    key: format!("{:?}", key),
                    source,
                })
            }
        }
    }

    /// Like [`get_instance`](Self::get_instance) for factories that cannot fail.
    pub fn get_or_init<T, F>(&self, key: K, init: F) -> Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.get_instance(key, || Ok::<T, Infallible>(init()))
    }

    /// Retrieves a published instance without constructing anything.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if the key is absent or still constructing.
    /// - [`RegistryError::TypeMismatch`] if the key holds a different type.
    pub fn get<T: Send + Sync + 'static>(&self, key: &K) -> Result<Arc<T>, RegistryError> {
        let result = match self.published_instance(key) {
            Some(instance) => downcast(key, instance),
            None => Err(RegistryError::NotFound {
                key: format!("{:?}", key),
            }),
        };

        self.emit_event(|| RegistryEvent::Get {
            key: format!("{:?}", key),
            found: result.is_ok(),
        });

        result
    }

    /// Checks whether an instance has been published for `key`.
    pub fn contains(&self, key: &K) -> bool {
        let found = self.published_instance(key).is_some();

        self.emit_event(|| RegistryEvent::Contains {
            key: format!("{:?}", key),
            found,
        });

        found
    }

    fn published_instance(&self, key: &K) -> Option<Instance> {
        self.published
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    // Lock order is `constructing`, then `published`. Both critical sections
    // only insert or remove map entries, so poisoned locks are recovered.
    fn lock_constructing(&self) -> MutexGuard<'_, HashMap<K, ThreadId>> {
        self.constructing.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SingletonRegistry<TypeId> {
    /// Returns the single instance of type `T`, keyed by the type itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use singleton_pool::{BoundedPool, SingletonRegistry};
    /// use std::any::TypeId;
    /// use std::convert::Infallible;
    ///
    /// let registry: SingletonRegistry<TypeId> = SingletonRegistry::new();
    /// let a = registry.instance_of(|| Ok::<_, Infallible>(BoundedPool::default())).unwrap();
    /// let b = registry.instance_of::<BoundedPool, Infallible, _>(|| unreachable!()).unwrap();
    /// assert_eq!(a.id(), b.id());
    /// ```
    pub fn instance_of<T, E, F>(&self, factory: F) -> Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.get_instance(TypeId::of::<T>(), factory)
    }
}

impl<K> Default for SingletonRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug> fmt::Debug for SingletonRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let published = self.published.read().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("SingletonRegistry")
            .field("published", &published.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn downcast<K: fmt::Debug, T: Send + Sync + 'static>(
    key: &K,
    instance: Instance,
) -> Result<Arc<T>, RegistryError> {
    instance
        .downcast::<T>()
        .map_err(|_| RegistryError::TypeMismatch {
            key: format!("{:?}", key),
            type_name: std::any::type_name::<T>(),
        })
}

/// Marks a key as constructing for as long as it is armed. Dropping it armed
/// (factory error or panic) returns the key to absent and wakes waiters.
struct PendingConstruction<'a, K: Eq + Hash + Clone + fmt::Debug> {
    registry: &'a SingletonRegistry<K>,
    key: &'a K,
    armed: bool,
}

impl<K: Eq + Hash + Clone + fmt::Debug> PendingConstruction<'_, K> {
    fn publish(mut self, instance: Instance) {
        let mut constructing = self.registry.lock_constructing();
        self.registry
            .published
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(self.key.clone(), instance);
        constructing.remove(self.key);
        drop(constructing);

        self.armed = false;
        self.registry.construction_done.notify_all();
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug> Drop for PendingConstruction<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.lock_constructing().remove(self.key);
            self.registry.construction_done.notify_all();
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
