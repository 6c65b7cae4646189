use crate::http::{make_boxed_error_response, make_json_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Readiness of every dependency the process reports on, keyed by component name.
pub type ComponentStatus = BTreeMap<&'static str, bool>;

#[derive(Serialize, Debug, PartialEq)]
struct ReadyBody {
    ready: bool,
    components: ComponentStatus,
}

/// Serves `/health` (the process is up) and `/ready` (every component
/// reported by the probe is ready). The probe must be cheap: it is called
/// once per request and should read cached state rather than do I/O.
pub struct AdminService<F, E> {
    probe: F,
    _error: PhantomData<E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> ComponentStatus,
{
    pub fn new(probe: F) -> Self {
        Self {
            probe,
            _error: PhantomData,
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> ComponentStatus + Send + Sync + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let components = (self.probe)();

        Box::pin(async move {
            let res = match req.uri().path() {
                "/health" => {
                    make_json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
                }
                "/ready" => {
                    let ready = components.values().all(|ready| *ready);
                    let status = if ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    make_json_response(status, &ReadyBody { ready, components })
                }
                _ => make_boxed_error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}
