// File: ./src/client/middleware.rs
//! Tower middleware applying the headers every API request carries.
use http::Request;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

#[derive(Clone, Debug)]
pub struct BaseHeadersLayer {
    pub user_agent: String,
}

impl BaseHeadersLayer {
    pub fn new(user_agent: String) -> Self {
        Self { user_agent }
    }
}

impl<S> Layer<S> for BaseHeadersLayer {
    type Service = BaseHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BaseHeadersService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BaseHeadersService<S> {
    inner: S,
    user_agent: String,
}

impl<S, ReqBody> Service<Request<ReqBody>> for BaseHeadersService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if let Ok(val) = http::HeaderValue::from_str(&self.user_agent) {
            req.headers_mut().insert(http::header::USER_AGENT, val);
        }
        req.headers_mut().insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );
        self.inner.call(req)
    }
}
