use lazy_static::lazy_static;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle stored in `Val::Resource`
pub type ResourceRef = Arc<Resource>;

/// Cleanup routine run when a resource is closed
pub type Destructor = Box<dyn FnOnce() + Send>;

/// Type reported by `get_resource_type()` once a resource has been closed
pub const CLOSED_RESOURCE_KIND: &str = "Unknown";

/// An opaque external handle (stream, connection, process...)
///
/// The payload is stored type-erased and recovered with [`Resource::with_payload`],
/// so extensions keep their concrete types without the registry knowing them.
pub struct Resource {
    id: u64,
    kind: String,
    closed: AtomicBool,
    destructor: Mutex<Option<Destructor>>,
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Resource {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Type tag; closed resources report `Unknown`
    pub fn kind(&self) -> &str {
        if self.is_closed() {
            CLOSED_RESOURCE_KIND
        } else {
            &self.kind
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the handle. The destructor runs on the first call only; later
    /// calls return `false`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(id = self.id, kind = %self.kind, "resource closed");
        let destructor = lock(&self.destructor).take();
        if let Some(destructor) = destructor {
            destructor();
        }
        lock(&self.payload).take();
        true
    }

    /// Run `f` against the payload if it is present and of type `T`
    pub fn with_payload<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = lock(&self.payload);
        let payload = guard.as_mut()?.downcast_mut::<T>()?;
        Some(f(payload))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

struct Registry {
    next_id: u64,
    entries: HashMap<u64, ResourceRef>,
}

lazy_static! {
    static ref REGISTRY: Mutex<Registry> = Mutex::new(Registry {
        next_id: 1,
        entries: HashMap::new(),
    });
}

/// Process-wide registry of resource handles
///
/// Ids start at 1 and are never reused. Closed resources stay registered so
/// that stale handles can still be inspected. The registry owns every open
/// resource: dropping the returned handles does not release it, only
/// [`Resource::close`] does.
pub struct ResourceManager;

impl ResourceManager {
    pub fn register(kind: impl Into<String>, destructor: Option<Destructor>) -> ResourceRef {
        Self::register_with_payload(kind, destructor, None)
    }

    pub fn register_with_payload(
        kind: impl Into<String>,
        destructor: Option<Destructor>,
        payload: Option<Box<dyn Any + Send>>,
    ) -> ResourceRef {
        let mut registry = lock(&REGISTRY);
        let id = registry.next_id;
        registry.next_id += 1;
        let resource = Arc::new(Resource {
            id,
            kind: kind.into(),
            closed: AtomicBool::new(false),
            destructor: Mutex::new(destructor),
            payload: Mutex::new(payload),
        });
        registry.entries.insert(id, Arc::clone(&resource));
        resource
    }

    pub fn get(id: u64) -> Option<ResourceRef> {
        lock(&REGISTRY).entries.get(&id).cloned()
    }

    /// Ids of open resources with the given type tag, ascending
    pub fn ids_of_kind(kind: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = lock(&REGISTRY)
            .entries
            .values()
            .filter(|res| !res.is_closed() && res.kind == kind)
            .map(|res| res.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Close by id; `false` when unknown or already closed
    pub fn close(id: u64) -> bool {
        // Release the registry lock before running the destructor
        let resource = Self::get(id);
        resource.map(|res| res.close()).unwrap_or(false)
    }

    /// Drop registry entries of closed resources. Returns how many were removed.
    pub fn purge_closed() -> usize {
        let mut registry = lock(&REGISTRY);
        let before = registry.entries.len();
        registry.entries.retain(|_, res| !res.is_closed());
        before - registry.entries.len()
    }
}
