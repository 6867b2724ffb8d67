//! Ordered application of interceptor hooks.
//!
//! Both phases fold a `Result<Exchange, FetchError>` through the
//! interceptors in registration order: an `Ok` value goes to the
//! interceptor's success hook, an `Err` to its error hook. An error hook that
//! returns `Ok` ends the error branch; one that returns `Err` passes it on.

use crate::client::Client;
use crate::config::{Exchange, InterceptorEntry};
use crate::{FetchError, Request, Response};

/// The interceptors of one client, applied to one request.
#[derive(Clone, Copy)]
pub(crate) struct InterceptorChain<'a> {
    interceptors: &'a [InterceptorEntry],
}

impl<'a> InterceptorChain<'a> {
    pub(crate) fn new(interceptors: &'a [InterceptorEntry]) -> Self {
        Self { interceptors }
    }

    /// Run the request phase.
    ///
    /// Once a hook answers with a response, the remaining request hooks are
    /// skipped and the response is returned. A request handed on by a hook
    /// keeps the identity of the request that entered the phase.
    pub(crate) async fn apply_request(&self, request: Request) -> Result<Exchange, FetchError> {
        let id = request.id();
        let mut state = Ok(Exchange::Request(request));
        for entry in self.interceptors {
            let interceptor = &entry.interceptor;
            state = match state {
                Ok(Exchange::Request(request)) => interceptor.on_request(request).await,
                Ok(response @ Exchange::Response(_)) => Ok(response),
                Err(error) => interceptor.on_request_error(error).await,
            };
            if let Ok(Exchange::Request(request)) = &mut state {
                request.set_id(id);
            }
        }
        state
    }

    /// Run the response phase for the outcome of sending `request`.
    ///
    /// Once a hook answers with a request to replay, the remaining response
    /// hooks are skipped and the request is returned.
    pub(crate) async fn apply_response(
        &self,
        outcome: Result<Response, FetchError>,
        request: &Request,
        client: &Client,
    ) -> Result<Exchange, FetchError> {
        let mut state = outcome.map(Exchange::Response);
        for entry in self.interceptors {
            let interceptor = &entry.interceptor;
            state = match state {
                Ok(Exchange::Response(response)) => {
                    interceptor.on_response(response, request, client).await
                }
                Ok(replay @ Exchange::Request(_)) => Ok(replay),
                Err(error) => interceptor.on_response_error(error, request, client).await,
            };
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::transport::transport_fn;
    use crate::{BoxFuture, Interceptor, OnRequest, OnResponse};
    use http::{HeaderName, HeaderValue, StatusCode};
    use std::sync::{Arc, Mutex};

    fn client() -> Client {
        Client::with_transport(transport_fn(|_request| async {
            Ok(Response::new(StatusCode::OK))
        }))
    }

    /// Records the order in which its hooks run.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, hook: &str) {
            self.log.lock().unwrap().push(format!("{}.{}", self.name, hook));
        }
    }

    impl Interceptor for Recorder {
        fn on_request(&self, request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
            self.push("request");
            Box::pin(async move { Ok(Exchange::Request(request)) })
        }

        fn on_request_error(&self, error: FetchError) -> BoxFuture<'_, Result<Exchange, FetchError>> {
            self.push("request_error");
            Box::pin(async move { Err(error) })
        }

        fn on_response<'a>(
            &'a self,
            response: Response,
            _request: &'a Request,
            _client: &'a Client,
        ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
            self.push("response");
            Box::pin(async move { Ok(Exchange::Response(response)) })
        }

        fn on_response_error<'a>(
            &'a self,
            error: FetchError,
            _request: &'a Request,
            _client: &'a Client,
        ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
            self.push("response_error");
            Box::pin(async move { Err(error) })
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(recorder("a", &log))
            .with_interceptor(recorder("b", &log));
        let chain = InterceptorChain::new(&config.interceptors);
        let request = Request::new("http://x/");

        chain.apply_request(request.clone()).await.unwrap();
        chain
            .apply_response(Ok(Response::new(StatusCode::OK)), &request, &client())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a.request", "b.request", "a.response", "b.response"]
        );
    }

    #[tokio::test]
    async fn test_request_hooks_transform_in_sequence() {
        let config = Configuration::new()
            .with_interceptor(OnRequest::new(|mut request: Request| {
                request.set_url(format!("{}/first", request.url()));
                Ok(Exchange::Request(request))
            }))
            .with_interceptor(OnRequest::new(|mut request: Request| {
                request.set_url(format!("{}/second", request.url()));
                Ok(Exchange::Request(request))
            }));
        let chain = InterceptorChain::new(&config.interceptors);

        let out = chain.apply_request(Request::new("http://x")).await.unwrap();
        let Exchange::Request(request) = out else {
            panic!("expected a request");
        };
        assert_eq!(request.url(), "http://x/first/second");
    }

    #[tokio::test]
    async fn test_replaced_request_keeps_identity() {
        let config = Configuration::new().with_interceptor(OnRequest::new(|request: Request| {
            Ok(Exchange::Request(Request::new(format!("{}/moved", request.url()))))
        }));
        let chain = InterceptorChain::new(&config.interceptors);
        let request = Request::new("http://x");

        let out = chain.apply_request(request.clone()).await.unwrap();
        let Exchange::Request(moved) = out else {
            panic!("expected a request");
        };
        assert_eq!(moved.url(), "http://x/moved");
        assert_eq!(moved.id(), request.id());
    }

    #[tokio::test]
    async fn test_response_short_circuits_remaining_request_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(OnRequest::new(|_request| {
                Ok(Exchange::Response(Response::new(StatusCode::ACCEPTED)))
            }))
            .with_interceptor(recorder("after", &log));
        let chain = InterceptorChain::new(&config.interceptors);

        let out = chain.apply_request(Request::new("http://x/")).await.unwrap();
        assert!(matches!(out, Exchange::Response(r) if r.status() == StatusCode::ACCEPTED));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_error_flows_to_next_error_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(OnRequest::new(|_request| Err(FetchError::interceptor("denied"))))
            .with_interceptor(recorder("next", &log));
        let chain = InterceptorChain::new(&config.interceptors);

        let err = chain.apply_request(Request::new("http://x/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Interceptor(msg) if msg == "denied"));
        assert_eq!(*log.lock().unwrap(), vec!["next.request_error"]);
    }

    struct Recover;

    impl Interceptor for Recover {
        fn on_response_error<'a>(
            &'a self,
            error: FetchError,
            _request: &'a Request,
            _client: &'a Client,
        ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
            Box::pin(async move {
                let status = error.status().unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
                Ok(Exchange::Response(
                    Response::new(StatusCode::OK)
                        .with_header(HeaderName::from_static("x-recovered"), HeaderValue::from(status.as_u16())),
                ))
            })
        }
    }

    #[tokio::test]
    async fn test_error_hook_can_recover() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(Recover)
            .with_interceptor(recorder("after", &log));
        let chain = InterceptorChain::new(&config.interceptors);
        let request = Request::new("http://x/");

        let out = chain
            .apply_response(Err(FetchError::transport("reset")), &request, &client())
            .await
            .unwrap();

        let Exchange::Response(response) = out else {
            panic!("expected a response");
        };
        assert_eq!(response.headers().get("x-recovered").unwrap(), "503");
        assert_eq!(*log.lock().unwrap(), vec!["after.response"]);
    }

    #[tokio::test]
    async fn test_failing_success_hook_skips_own_error_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(OnResponse::new(|_response: Response, _request: &Request| {
                Err(FetchError::interceptor("bad response"))
            }))
            .with_interceptor(recorder("next", &log));
        let chain = InterceptorChain::new(&config.interceptors);
        let request = Request::new("http://x/");

        let err = chain
            .apply_response(Ok(Response::new(StatusCode::OK)), &request, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Interceptor(_)));
        assert_eq!(*log.lock().unwrap(), vec!["next.response_error"]);
    }

    #[tokio::test]
    async fn test_replay_request_skips_remaining_response_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = Configuration::new()
            .with_interceptor(OnResponse::new(|_response: Response, request: &Request| {
                Ok(Exchange::Request(request.clone()))
            }))
            .with_interceptor(recorder("after", &log));
        let chain = InterceptorChain::new(&config.interceptors);
        let request = Request::new("http://x/");

        let out = chain
            .apply_response(Ok(Response::new(StatusCode::OK)), &request, &client())
            .await
            .unwrap();
        assert!(matches!(out, Exchange::Request(r) if r.id() == request.id()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let chain = InterceptorChain::new(&[]);
        let request = Request::new("http://x/");

        let out = chain.apply_request(request.clone()).await.unwrap();
        assert!(matches!(out, Exchange::Request(r) if r.id() == request.id()));

        let err = chain
            .apply_response(Err(FetchError::transport("down")), &request, &client())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
