use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::{
    errors::ToggleError,
    store::{self, FlagStore},
    stub::Stub,
};

/// A synchronous method: receiver and arguments in, output out.
pub type SyncMethod<R, A, O> = Arc<dyn Fn(&R, A) -> O + Send + Sync>;

/// An asynchronous method. The receiver is shared as an `Arc` so the returned
/// future can outlive the call.
pub type AsyncMethod<R, A, O> = Arc<dyn Fn(Arc<R>, A) -> BoxFuture<'static, O> + Send + Sync>;

/// Builds an instance of `T`, usually a trait object for the capability the
/// toggled types share.
pub type Factory<A, T> = Arc<dyn Fn(A) -> Box<T> + Send + Sync>;

pub type ToggledMethod<R, A, O> = Toggled<SyncMethod<R, A, O>>;
pub type ToggledAsyncMethod<R, A, O> = Toggled<AsyncMethod<R, A, O>>;
pub type ToggledFactory<A, T> = Toggled<Factory<A, T>>;

/// Which implementation a declaration settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Original,
    Fallback,
    Stub,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Resolution::Original => "original",
                Resolution::Fallback => "fallback",
                Resolution::Stub => "stub",
            }
        )
    }
}

/// Implementations that can be synthesized when a flag is off and no fallback
/// was given: methods whose output has a `Default`, and factories whose
/// product has a `Stub`.
pub trait Inert {
    fn inert() -> Self;
}

impl<R, A, O> Inert for SyncMethod<R, A, O>
where
    R: ?Sized + 'static,
    A: 'static,
    O: Default + 'static,
{
    fn inert() -> Self {
        Arc::new(|_: &R, _: A| O::default())
    }
}

impl<R, A, O> Inert for AsyncMethod<R, A, O>
where
    R: ?Sized + 'static,
    A: 'static,
    O: Default + Send + 'static,
{
    fn inert() -> Self {
        Arc::new(|_: Arc<R>, _: A| future::ready(O::default()).boxed())
    }
}

impl<A, T> Inert for Factory<A, T>
where
    A: 'static,
    T: ?Sized + Stub + 'static,
{
    fn inert() -> Self {
        // Constructor arguments are dropped without complaint.
        Arc::new(|_: A| T::stub())
    }
}

/// Decides, once per declaration, which implementation a toggled method or
/// factory uses.
///
/// The flag is read exactly once, when `resolve` is called on a pending
/// [`Toggle`]. The returned [`Toggled`] is frozen: flipping the flag later
/// does not change it, and only declarations resolved afterwards see the new
/// value. Toggles are therefore static per declaration and cost nothing per
/// call.
#[derive(Clone)]
pub struct ToggleResolver {
    store: Arc<dyn FlagStore>,
}

impl ToggleResolver {
    pub fn new(store: Arc<dyn FlagStore>) -> ToggleResolver {
        ToggleResolver { store }
    }

    /// Uses the store registered process-wide at this instant. Fails with
    /// `ProviderNotSet` when there is none; callers are expected to propagate
    /// it rather than carry on with every flag off.
    pub fn from_global() -> Result<ToggleResolver, ToggleError> {
        let store = store::global_store().ok_or(ToggleError::ProviderNotSet)?;
        Ok(ToggleResolver::new(store))
    }

    pub fn method<R, A, O, F>(&self, key: impl Into<String>, original: F) -> Toggle<SyncMethod<R, A, O>>
    where
        R: ?Sized + 'static,
        A: 'static,
        O: 'static,
        F: Fn(&R, A) -> O + Send + Sync + 'static,
    {
        let original: SyncMethod<R, A, O> = Arc::new(original);
        self.pending(key, original)
    }

    pub fn async_method<R, A, O, F, Fut>(
        &self,
        key: impl Into<String>,
        original: F,
    ) -> Toggle<AsyncMethod<R, A, O>>
    where
        R: ?Sized + Send + Sync + 'static,
        A: 'static,
        O: Send + 'static,
        F: Fn(Arc<R>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        self.pending(key, boxed_async(original))
    }

    pub fn factory<A, T, F>(&self, key: impl Into<String>, original: F) -> Toggle<Factory<A, T>>
    where
        A: 'static,
        T: ?Sized + 'static,
        F: Fn(A) -> Box<T> + Send + Sync + 'static,
    {
        let original: Factory<A, T> = Arc::new(original);
        self.pending(key, original)
    }

    fn pending<I>(&self, key: impl Into<String>, original: I) -> Toggle<I> {
        Toggle {
            resolver: self.clone(),
            key: key.into(),
            original,
        }
    }

    fn decide<I>(
        &self,
        key: String,
        original: I,
        when_disabled: impl FnOnce() -> (Resolution, I),
    ) -> Toggled<I> {
        let enabled = self.store.is_enabled(&key);
        let (resolution, implementation) = if enabled {
            (Resolution::Original, original)
        } else {
            when_disabled()
        };
        tracing::debug!(key = %key, enabled, outcome = %resolution, "resolved toggle");
        Toggled {
            key,
            resolution,
            implementation,
        }
    }
}

fn boxed_async<R, A, O, F, Fut>(method: F) -> AsyncMethod<R, A, O>
where
    R: ?Sized + Send + Sync + 'static,
    A: 'static,
    O: Send + 'static,
    F: Fn(Arc<R>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    Arc::new(move |receiver: Arc<R>, args: A| method(receiver, args).boxed())
}

/// A declaration that has not been resolved yet. Building one does not touch
/// the flag store.
pub struct Toggle<I> {
    resolver: ToggleResolver,
    key: String,
    original: I,
}

impl<I: Inert> Toggle<I> {
    /// Resolves with no fallback: when the flag is off, a synthesized no-op
    /// takes the original's place.
    pub fn resolve(self) -> Toggled<I> {
        self.resolver
            .decide(self.key, self.original, || (Resolution::Stub, I::inert()))
    }
}

impl<R, A, O> Toggle<SyncMethod<R, A, O>>
where
    R: ?Sized + 'static,
    A: 'static,
    O: 'static,
{
    /// Runs instead of the original when the flag is off, with the same
    /// receiver and arguments.
    pub fn fallback<F>(self, fallback: F) -> WithFallback<SyncMethod<R, A, O>>
    where
        F: Fn(&R, A) -> O + Send + Sync + 'static,
    {
        let fallback: SyncMethod<R, A, O> = Arc::new(fallback);
        WithFallback {
            toggle: self,
            fallback,
        }
    }
}

impl<R, A, O> Toggle<AsyncMethod<R, A, O>>
where
    R: ?Sized + Send + Sync + 'static,
    A: 'static,
    O: Send + 'static,
{
    pub fn fallback<F, Fut>(self, fallback: F) -> WithFallback<AsyncMethod<R, A, O>>
    where
        F: Fn(Arc<R>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        WithFallback {
            toggle: self,
            fallback: boxed_async(fallback),
        }
    }
}

impl<A, T> Toggle<Factory<A, T>>
where
    A: 'static,
    T: ?Sized + 'static,
{
    /// Builds instances in place of the original when the flag is off.
    pub fn fallback<F>(self, fallback: F) -> WithFallback<Factory<A, T>>
    where
        F: Fn(A) -> Box<T> + Send + Sync + 'static,
    {
        let fallback: Factory<A, T> = Arc::new(fallback);
        WithFallback {
            toggle: self,
            fallback,
        }
    }
}

/// A pending declaration with a fallback. No stub is ever needed, so outputs
/// without a `Default` are fine here.
pub struct WithFallback<I> {
    toggle: Toggle<I>,
    fallback: I,
}

impl<I> WithFallback<I> {
    pub fn resolve(self) -> Toggled<I> {
        let Toggle {
            resolver,
            key,
            original,
        } = self.toggle;
        let fallback = self.fallback;
        resolver.decide(key, original, move || (Resolution::Fallback, fallback))
    }
}

/// A resolved declaration: exactly one implementation, chosen once.
pub struct Toggled<I> {
    key: String,
    resolution: Resolution,
    implementation: I,
}

impl<I> Toggled<I> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_original(&self) -> bool {
        self.resolution == Resolution::Original
    }

    pub fn is_fallback(&self) -> bool {
        self.resolution == Resolution::Fallback
    }

    pub fn is_stub(&self) -> bool {
        self.resolution == Resolution::Stub
    }
}

impl<R: ?Sized, A, O> Toggled<SyncMethod<R, A, O>> {
    /// Calls the resolved implementation. Whatever it returns, including an
    /// `Err`, is handed back untouched.
    pub fn call(&self, receiver: &R, args: A) -> O {
        (self.implementation)(receiver, args)
    }
}

impl<R: ?Sized, A, O> Toggled<AsyncMethod<R, A, O>> {
    /// Returns the resolved implementation's future as is: no timeout, retry
    /// or cancellation is layered on. A stub's future is already complete.
    pub fn call(&self, receiver: Arc<R>, args: A) -> BoxFuture<'static, O> {
        (self.implementation)(receiver, args)
    }
}

impl<A, T: ?Sized> Toggled<Factory<A, T>> {
    pub fn construct(&self, args: A) -> Box<T> {
        (self.implementation)(args)
    }
}

impl<I> fmt::Debug for Toggled<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggled")
            .field("key", &self.key)
            .field("resolution", &self.resolution)
            .finish()
    }
}
