//! Tower layer for fallback composition.

use crate::{Fallback, FallbackError};
use futures::future::BoxFuture;
use std::future::Future;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower layer that answers failed requests from a fallback function.
///
/// The fallback receives the inner service's error.
///
/// ```
/// use bulwark_fallback::{Fallback, FallbackLayer};
/// use tower::ServiceBuilder;
///
/// let fallback = Fallback::<std::io::Error>::builder().name("quotes").build();
/// let layer = FallbackLayer::new(fallback, |_err: std::io::Error| async {
///     Ok::<_, std::io::Error>("cached quote".to_string())
/// });
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service_fn(|_req: ()| async { Ok::<_, std::io::Error>("live quote".to_string()) });
/// # let _ = service;
/// ```
pub struct FallbackLayer<E, F> {
    fallback: Fallback<E>,
    f: F,
}

impl<E, F> FallbackLayer<E, F> {
    /// Creates a layer running `f` through `fallback` when the inner service
    /// fails.
    pub fn new(fallback: Fallback<E>, f: F) -> Self {
        Self { fallback, f }
    }
}

impl<E, F: Clone> Clone for FallbackLayer<E, F> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
            f: self.f.clone(),
        }
    }
}

impl<S, E, F: Clone> Layer<S> for FallbackLayer<E, F> {
    type Service = FallbackService<S, E, F>;

    fn layer(&self, service: S) -> Self::Service {
        FallbackService {
            inner: service,
            fallback: self.fallback.clone(),
            f: self.f.clone(),
        }
    }
}

/// A Tower service that answers failed requests from a fallback function.
pub struct FallbackService<S, E, F> {
    inner: S,
    fallback: Fallback<E>,
    f: F,
}

impl<S: Clone, E, F: Clone> Clone for FallbackService<S, E, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fallback: self.fallback.clone(),
            f: self.f.clone(),
        }
    }
}

impl<S, Req, E, F, Fut> Service<Req> for FallbackService<S, E, F>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
    E: Send + 'static,
    F: FnOnce(E) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<S::Response, E>> + Send + 'static,
{
    type Response = S::Response;
    type Error = FallbackError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(FallbackError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let fallback = self.fallback.clone();
        let f = self.f.clone();
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { fallback.call(|| inner.oneshot(req), f).await })
    }
}
