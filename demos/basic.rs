//! A small resource map served over HTTP: users with nested cars, a custom
//! action, a cached lookup and a streamed export.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api
//!   curl http://localhost:3000/api/users/1
//!   curl http://localhost:3000/api/users/1/isCool
//!   curl http://localhost:3000/api/users/1/cars
//!   curl -X POST http://localhost:3000/api/users -d '{"name":"carol"}'
//!   curl http://localhost:3000/api/users/export
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'x-http-method-override: GET' -d '{"limit":1}'

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use resourceful::{
    Action, Api, CacheControl, CacheSpec, CacheStore, Endpoint, Error, Method, Options, Request,
    Resource, Resources, Server, StreamReply, middleware,
};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Process-local cache store.
#[derive(Default)]
struct MemoryStore(Mutex<HashMap<String, Value>>);

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, _: &Options, key: &str) -> Result<Option<Value>, Error> {
        Ok(self.0.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    async fn set(&self, _: &Options, value: &Value, key: &str) -> Result<(), Error> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_owned(), value.clone());
        Ok(())
    }
}

fn users() -> Value {
    json!([{ "id": 1, "name": "alice" }, { "id": 2, "name": "bob" }])
}

fn find_user(options: &Options) -> Value {
    let id = options.u64("userId");
    users()
        .as_array()
        .and_then(|all| all.iter().find(|u| u["id"].as_u64() == id).cloned())
        .unwrap_or(Value::Null)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());

    let resources = Resources::new().resource(
        "user",
        Resource::new()
            .create(Endpoint::sync(|opts| Ok(json!({ "created": opts.get("name") }))))
            .find(Endpoint::sync(|opts| {
                let limit = opts.str("limit").and_then(|l| l.parse().ok()).unwrap_or(usize::MAX);
                let all = users().as_array().cloned().unwrap_or_default();
                Ok(Value::Array(all.into_iter().take(limit).collect()))
            }))
            .find_by_id(
                Endpoint::future(|opts| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, Error>(find_user(&opts))
                })
                .cache(
                    CacheSpec::shared(Arc::clone(&store))
                        .header(CacheControl::public().max_age(Duration::from_secs(60))),
                ),
            )
            .action("isCool", Endpoint::sync(|opts| Ok(json!(opts.u64("userId") == Some(1)))))
            .action(
                "export",
                Action::new(Endpoint::sync(|_| {
                    let lines = users()
                        .as_array()
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|u| Ok::<_, Error>(Bytes::from(format!("{u}\n"))));
                    Ok(StreamReply::new("application/x-ndjson", stream::iter(lines)))
                }))
                .http(Method::Get, false),
            )
            .child(
                "car",
                Resource::new()
                    .find(Endpoint::callback(|opts, responder| {
                        tokio::spawn(async move {
                            let owner = opts.u64("userId");
                            responder.ok(json!([{ "id": 7, "owner": owner }]));
                        });
                    }))
                    .find_by_id(Endpoint::value(json!({ "id": 7, "make": "volvo" }))),
            ),
    );

    let app = Api::new(resources)
        .base("/api")
        .pre(|opts: &mut Options, _: &Request| -> Result<(), Error> {
            opts.insert("requestedAt", "now");
            Ok(())
        })
        .build()?
        .rewrite(middleware::rewrite_large_requests);

    let addr = std::env::var("RESOURCEFUL_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());
    info!(%addr, "starting demo");
    Server::bind(&addr)?.serve(app).await
}
