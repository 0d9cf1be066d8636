//! Idempotent mutation interceptor.
//!
//! Every mutating request (POST, PUT, PATCH, DELETE) must carry an
//! `Idempotency-Key` header. The first attempt with a given key reserves
//! the key in the shared store, executes the handler, and on success
//! persists the response for the retention window. Retries within that
//! window replay the stored response byte for byte without re-executing
//! business logic. Failed attempts release the key so the client can retry
//! immediately; failures are never cached.
//!
//! Reusing a key with a different request payload is rejected, and a retry
//! arriving while the first attempt is still executing is refused with a
//! conflict rather than being allowed to race it.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody, to_bytes};
use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::web::Bytes;
use actix_web::{Error, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{debug, warn};

use crate::domain;
use crate::domain::idempotency::{
    IdempotencyConfig, IdempotencyKey, IdempotencyLookupResult, IdempotencyRecord,
    hash_request_payload,
};
use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};

/// Header clients use to mark a mutation as safely retryable.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Methods treated as mutations and therefore required to carry a key.
const MUTATING_METHODS: [Method; 4] = [Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

/// Middleware enforcing idempotency-key semantics on mutating requests.
pub struct Idempotency {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl Idempotency {
    /// Create the interceptor over a shared store.
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Idempotency
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = IdempotencyMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdempotencyMiddleware {
            service: Rc::new(service),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }))
    }
}

/// Service wrapper produced by [`Idempotency`].
pub struct IdempotencyMiddleware<S> {
    service: Rc<S>,
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl<S, B> Service<ServiceRequest> for IdempotencyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !MUTATING_METHODS.contains(req.method()) {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let service = Rc::clone(&self.service);
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        Box::pin(async move {
            let mut req = req;
            let http_req = req.request().clone();
            let key = extract_key(&http_req)?;

            let payload = buffer_payload(&mut req).await?;
            let payload_hash = hash_request_payload(&payload);

            match store.lookup(&key).await.map_err(store_failure)? {
                IdempotencyLookupResult::Completed(record) => {
                    if record.payload_hash() != &payload_hash {
                        return Err(domain::Error::unprocessable(
                            "idempotency key was already used with a different payload",
                        )
                        .into());
                    }
                    debug!(key = %key, "replaying stored response");
                    let response = replay(&record);
                    return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
                }
                IdempotencyLookupResult::InFlight => {
                    return Err(in_flight_conflict().into());
                }
                IdempotencyLookupResult::Miss => {}
            }

            let reserved = store
                .reserve(&key, config.reservation_ttl())
                .await
                .map_err(store_failure)?;
            if !reserved {
                // Lost the race against a concurrent first attempt.
                return Err(in_flight_conflict().into());
            }

            let res = match service.call(req).await {
                Ok(res) => res,
                Err(err) => {
                    release(store.as_ref(), &key).await;
                    return Err(err);
                }
            };

            if !res.status().is_success() {
                release(store.as_ref(), &key).await;
                return Ok(res.map_into_left_body());
            }

            let (http_req, response) = res.into_parts();
            let (head, body) = response.into_parts();
            let bytes = to_bytes(body).await.map_err(|err| {
                let err: Box<dyn std::error::Error> = err.into();
                domain::Error::internal(format!("failed to buffer response body: {err}"))
            })?;

            match String::from_utf8(bytes.to_vec()) {
                Ok(text) => {
                    let content_type = head
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_owned);
                    let record = IdempotencyRecord::new(
                        key.clone(),
                        payload_hash,
                        head.status(),
                        content_type,
                        text,
                    );
                    if let Err(err) = store.complete(&record, config.ttl()).await {
                        warn!(key = %key, error = %err, "failed to store idempotency record");
                        release(store.as_ref(), &key).await;
                    }
                }
                Err(_) => {
                    // Non-UTF-8 bodies cannot be recorded; let the retry
                    // re-execute rather than replay a corrupted response.
                    warn!(key = %key, "response body is not UTF-8, skipping record");
                    release(store.as_ref(), &key).await;
                }
            }

            let response = head.set_body(bytes).map_into_boxed_body();
            Ok(ServiceResponse::new(http_req, response).map_into_right_body())
        })
    }
}

fn extract_key(req: &HttpRequest) -> Result<IdempotencyKey, domain::Error> {
    let raw = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .ok_or_else(|| {
            domain::Error::invalid_request(
                "Idempotency-Key header is required for mutating requests",
            )
        })?
        .to_str()
        .map_err(|_| domain::Error::invalid_request("Idempotency-Key header is not valid ASCII"))?;
    IdempotencyKey::new(raw).map_err(|err| domain::Error::invalid_request(err.to_string()))
}

/// Consume the request payload into memory and restore it for extractors.
async fn buffer_payload(req: &mut ServiceRequest) -> Result<Bytes, Error> {
    let bytes = {
        let (http_req, payload) = req.parts_mut();
        Bytes::from_request(http_req, payload).await?
    };
    let replayed: Result<Bytes, actix_web::error::PayloadError> = Ok(bytes.clone());
    req.set_payload(dev::Payload::Stream {
        payload: Box::pin(futures_util::stream::once(std::future::ready(replayed))),
    });
    Ok(bytes)
}

fn replay(record: &IdempotencyRecord) -> HttpResponse {
    let mut builder = HttpResponse::build(record.status());
    if let Some(content_type) = record.content_type() {
        builder.insert_header((CONTENT_TYPE, content_type));
    }
    builder.body(record.body().to_owned())
}

fn in_flight_conflict() -> domain::Error {
    domain::Error::conflict("a request with this idempotency key is already in flight")
}

fn store_failure(err: IdempotencyStoreError) -> Error {
    warn!(error = %err, "idempotency store operation failed");
    domain::Error::service_unavailable("idempotency store is unavailable").into()
}

async fn release(store: &dyn IdempotencyStore, key: &IdempotencyKey) {
    if let Err(err) = store.release(key).await {
        warn!(key = %key, error = %err, "failed to release idempotency key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};

    use crate::domain::ports::MockIdempotencyStore;
    use crate::outbound::idempotency::InMemoryIdempotencyStore;

    fn config() -> IdempotencyConfig {
        IdempotencyConfig::with_ttls(Duration::from_secs(3600), Duration::from_secs(30))
    }

    async fn counting_app(
        store: Arc<dyn IdempotencyStore>,
        counter: Arc<AtomicUsize>,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = Error>
    {
        test::init_service(
            App::new()
                .wrap(Idempotency::new(store, config()))
                .app_data(web::Data::new(counter))
                .route(
                    "/plans",
                    web::post().to(|counter: web::Data<Arc<AtomicUsize>>| async move {
                        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        HttpResponse::Created()
                            .content_type("application/json")
                            .body(format!(r#"{{"execution":{count}}}"#))
                    }),
                ),
        )
        .await
    }

    fn post(key: &str, body: &'static str) -> actix_http::Request {
        test::TestRequest::post()
            .uri("/plans")
            .insert_header((IDEMPOTENCY_KEY_HEADER, key))
            .insert_header(("content-type", "application/json"))
            .set_payload(body)
            .to_request()
    }

    #[actix_web::test]
    async fn replays_the_first_response_on_retry() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = counting_app(store, Arc::clone(&counter)).await;

        let first = test::call_service(&app, post("key-1", r#"{"name":"riverside"}"#)).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let first_body = test::read_body(first).await;

        let second = test::call_service(&app, post("key-1", r#"{"name":"riverside"}"#)).await;
        assert_eq!(second.status(), StatusCode::CREATED);
        let second_body = test::read_body(second).await;

        assert_eq!(first_body, second_body);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn different_keys_execute_independently() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = counting_app(store, Arc::clone(&counter)).await;

        test::call_service(&app, post("key-a", r#"{"name":"riverside"}"#)).await;
        test::call_service(&app, post("key-b", r#"{"name":"riverside"}"#)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn missing_key_is_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = counting_app(store, Arc::clone(&counter)).await;

        let req = test::TestRequest::post()
            .uri("/plans")
            .set_payload("{}")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn reused_key_with_different_payload_is_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = counting_app(store, Arc::clone(&counter)).await;

        test::call_service(&app, post("key-1", r#"{"name":"riverside"}"#)).await;
        let res = test::call_service(&app, post("key-1", r#"{"name":"hillside"}"#)).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn equivalent_json_payloads_replay_despite_key_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = counting_app(store, Arc::clone(&counter)).await;

        test::call_service(&app, post("key-1", r#"{"name":"riverside","zone":"r1"}"#)).await;
        let res =
            test::call_service(&app, post("key-1", r#"{"zone":"r1","name":"riverside"}"#)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn in_flight_key_is_refused() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let key = IdempotencyKey::new("key-1").expect("valid key");
        assert!(
            store
                .reserve(&key, Duration::from_secs(30))
                .await
                .expect("reserve")
        );

        let app = counting_app(store, Arc::clone(&counter)).await;
        let res = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn failures_are_never_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = test::init_service(
            App::new()
                .wrap(Idempotency::new(store, config()))
                .app_data(web::Data::new(Arc::clone(&counter)))
                .route(
                    "/plans",
                    web::post().to(|counter: web::Data<Arc<AtomicUsize>>| async move {
                        // First attempt fails, retries succeed.
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            HttpResponse::BadGateway().body("upstream down")
                        } else {
                            HttpResponse::Created().body(r#"{"ok":true}"#)
                        }
                    }),
                ),
        )
        .await;

        let first = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(first.status(), StatusCode::BAD_GATEWAY);

        let second = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn expired_records_execute_afresh() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let zero_ttl = IdempotencyConfig::with_ttls(Duration::ZERO, Duration::from_secs(30));
        let app = test::init_service(
            App::new()
                .wrap(Idempotency::new(store, zero_ttl))
                .app_data(web::Data::new(Arc::clone(&counter)))
                .route(
                    "/plans",
                    web::post().to(|counter: web::Data<Arc<AtomicUsize>>| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        HttpResponse::Created().body("{}")
                    }),
                ),
        )
        .await;

        test::call_service(&app, post("key-1", "{}")).await;
        test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn persistence_failure_still_returns_the_response() {
        let mut mock = MockIdempotencyStore::new();
        mock.expect_lookup()
            .returning(|_| Ok(IdempotencyLookupResult::Miss));
        mock.expect_reserve().returning(|_, _| Ok(true));
        mock.expect_complete()
            .returning(|_, _| Err(IdempotencyStoreError::query("write refused")));
        // Every failed persistence attempt must drop the reservation.
        mock.expect_release().times(2).returning(|_| Ok(()));

        let counter = Arc::new(AtomicUsize::new(0));
        let app = counting_app(Arc::new(mock), Arc::clone(&counter)).await;

        let first = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(test::read_body(first).await.as_ref(), br#"{"execution":1}"#);

        // Nothing was recorded, so the retry executes the handler again.
        let second = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn non_utf8_bodies_are_served_but_not_recorded() {
        const BODY: &[u8] = &[0x01, 0x9f, 0x92, 0x96];

        let counter = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = test::init_service(
            App::new()
                .wrap(Idempotency::new(store, config()))
                .app_data(web::Data::new(Arc::clone(&counter)))
                .route(
                    "/plans",
                    web::post().to(|counter: web::Data<Arc<AtomicUsize>>| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        HttpResponse::Created().body(BODY)
                    }),
                ),
        )
        .await;

        let first = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(test::read_body(first).await.as_ref(), BODY);

        // No record was stored, so the retry executes afresh.
        let second = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn store_outage_maps_to_service_unavailable() {
        let mut mock = MockIdempotencyStore::new();
        mock.expect_lookup()
            .returning(|_| Err(IdempotencyStoreError::connection("refused")));
        let counter = Arc::new(AtomicUsize::new(0));
        let app = counting_app(Arc::new(mock), Arc::clone(&counter)).await;

        let res = test::call_service(&app, post("key-1", "{}")).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn reads_pass_through_without_a_key() {
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = test::init_service(
            App::new()
                .wrap(Idempotency::new(store, config()))
                .route("/plans", web::get().to(|| async { HttpResponse::Ok().body("[]") })),
        )
        .await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/plans").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn handlers_can_still_read_the_buffered_payload() {
        #[derive(serde::Deserialize)]
        struct Payload {
            name: String,
        }

        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let app = test::init_service(
            App::new()
                .wrap(Idempotency::new(store, config()))
                .route(
                    "/plans",
                    web::post().to(|body: web::Json<Payload>| async move {
                        HttpResponse::Created().body(body.name.clone())
                    }),
                ),
        )
        .await;
        let res = test::call_service(&app, post("key-1", r#"{"name":"riverside"}"#)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(test::read_body(res).await.as_ref(), b"riverside");
    }
}
