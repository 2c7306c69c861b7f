//! # Resource factory interface.
//!
//! A [`ResourceFactory`] sources one [`ManagedResource`] per scope lifetime.
//! Resources that load in the background return [`Sourced::pending`] and
//! later call [`ResourceReadiness::ready`] (or `fail`) from any thread.
//!
//! ## Example
//! ```rust
//! use taskfloor::{ResourceFn, SimpleResource, Sourced, payload};
//!
//! let counter = ResourceFn::new(|_ctx| Ok(Sourced::ready(SimpleResource::new(payload(0_u64)))));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::escalation::Escalation;
use crate::payload::{Payload, downcast};
use crate::resources::CleanupEscalations;

/// A lifecycle-managed dependency handed to functions.
///
/// The kernel guarantees activation at most once per scope and recycle
/// exactly once; it does not serialize use of the object after activation.
pub trait ManagedResource: Send + Sync + 'static {
    /// The object injected into functions.
    fn object(&self) -> Payload;

    /// Capability exposed to administrations and governances.
    fn extension(&self, _name: &str) -> Option<Payload> {
        None
    }

    /// Releases the resource. Failures go into `cleanup`.
    fn recycle(&self, _cleanup: &mut CleanupEscalations) {}
}

/// Creates managed resources.
pub trait ResourceFactory: Send + Sync + 'static {
    /// Extension names resources from this factory expose.
    ///
    /// Checked at bind time against administrations and governances.
    fn extensions(&self) -> &[&'static str] {
        &[]
    }

    /// Sources a new resource.
    fn create(&self, ctx: &mut ResourceContext<'_>) -> Result<Sourced, Escalation>;
}

/// A freshly created resource and whether it is usable right away.
pub struct Sourced {
    pub(crate) resource: Box<dyn ManagedResource>,
    pub(crate) ready_now: bool,
}

impl Sourced {
    /// The resource is usable immediately.
    pub fn ready(resource: impl ManagedResource) -> Self {
        Self {
            resource: Box::new(resource),
            ready_now: true,
        }
    }

    /// The resource signals readiness later through [`ResourceReadiness`].
    pub fn pending(resource: impl ManagedResource) -> Self {
        Self {
            resource: Box::new(resource),
            ready_now: false,
        }
    }
}

/// Receiver of a resource's late readiness outcome.
pub(crate) trait ReadySignal: Send + Sync {
    fn signal(&self, outcome: Result<(), Escalation>);
}

/// Handle a pending resource uses to report readiness.
///
/// Cheap to clone; only the first outcome counts.
#[derive(Clone)]
pub struct ResourceReadiness {
    signal: Arc<dyn ReadySignal>,
}

impl ResourceReadiness {
    pub(crate) fn new(signal: Arc<dyn ReadySignal>) -> Self {
        Self { signal }
    }

    /// The resource is now usable; parked jobs resume.
    pub fn ready(&self) {
        self.signal.signal(Ok(()));
    }

    /// The resource could not be loaded; parked jobs escalate.
    pub fn fail(&self, escalation: Escalation) {
        self.signal.signal(Err(escalation));
    }
}

/// What a factory sees while creating a resource.
pub struct ResourceContext<'a> {
    name: &'a str,
    dependencies: &'a [Payload],
    readiness: ResourceReadiness,
}

impl<'a> ResourceContext<'a> {
    pub(crate) fn new(name: &'a str, dependencies: &'a [Payload], readiness: ResourceReadiness) -> Self {
        Self {
            name,
            dependencies,
            readiness,
        }
    }

    /// Name of the resource binding being sourced.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Object of the `i`-th declared dependency, downcast to `T`.
    pub fn dependency<T: Send + Sync + 'static>(&self, i: usize) -> Option<Arc<T>> {
        self.dependencies.get(i).and_then(downcast::<T>)
    }

    /// Object of the `i`-th declared dependency.
    pub fn dependency_payload(&self, i: usize) -> Option<Payload> {
        self.dependencies.get(i).cloned()
    }

    /// Handle for reporting readiness of a [`Sourced::pending`] resource.
    pub fn readiness(&self) -> ResourceReadiness {
        self.readiness.clone()
    }
}

type CreateFn = dyn Fn(&mut ResourceContext<'_>) -> Result<Sourced, Escalation> + Send + Sync;

/// Factory backed by a closure.
pub struct ResourceFn {
    create: Box<CreateFn>,
    extensions: Vec<&'static str>,
}

impl ResourceFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ResourceContext<'_>) -> Result<Sourced, Escalation> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(f),
            extensions: Vec::new(),
        }
    }

    /// Declares the extensions created resources expose.
    pub fn with_extensions(mut self, names: &[&'static str]) -> Self {
        self.extensions.extend_from_slice(names);
        self
    }

    pub fn arc<F>(f: F) -> Arc<dyn ResourceFactory>
    where
        F: Fn(&mut ResourceContext<'_>) -> Result<Sourced, Escalation> + Send + Sync + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl ResourceFactory for ResourceFn {
    fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    fn create(&self, ctx: &mut ResourceContext<'_>) -> Result<Sourced, Escalation> {
        (self.create)(ctx)
    }
}

type RecycleFn = dyn Fn() -> Result<(), Escalation> + Send + Sync;

/// Resource wrapping a ready-made object.
pub struct SimpleResource {
    object: Payload,
    extensions: HashMap<String, Payload>,
    on_recycle: Option<Box<RecycleFn>>,
}

impl SimpleResource {
    pub fn new(object: Payload) -> Self {
        Self {
            object,
            extensions: HashMap::new(),
            on_recycle: None,
        }
    }

    pub fn with_extension(mut self, name: impl Into<String>, extension: Payload) -> Self {
        self.extensions.insert(name.into(), extension);
        self
    }

    /// Hook run once when the resource is recycled.
    pub fn on_recycle<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<(), Escalation> + Send + Sync + 'static,
    {
        self.on_recycle = Some(Box::new(f));
        self
    }
}

impl ManagedResource for SimpleResource {
    fn object(&self) -> Payload {
        Arc::clone(&self.object)
    }

    fn extension(&self, name: &str) -> Option<Payload> {
        self.extensions.get(name).cloned()
    }

    fn recycle(&self, cleanup: &mut CleanupEscalations) {
        if let Some(hook) = &self.on_recycle {
            if let Err(e) = hook() {
                cleanup.push(e);
            }
        }
    }
}
