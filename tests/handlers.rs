mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{get, send};
use http::StatusCode;
use resourceful::{Action, Api, Endpoint, Error, Method, Options, Request, Resource, Resources, Router};
use serde_json::{Value, json};

fn users() -> Value {
    json!([
        { "id": 0, "name": "foo" },
        { "id": 1, "name": "bar" },
        { "id": 2, "name": "baz" }
    ])
}

fn cars() -> Value {
    let passengers = json!([{ "name": "todd" }, { "name": "rob" }]);
    let garage = json!([
        { "id": 0, "name": "foo", "passengers": passengers },
        { "id": 1, "name": "bar", "passengers": passengers },
        { "id": 2, "name": "baz", "passengers": passengers }
    ]);
    json!([garage, garage, garage])
}

fn id(options: &Options, key: &str) -> usize {
    options.u64(key).unwrap_or(u64::MAX) as usize
}

/// Answers through the responder, from a spawned task.
fn cb(answer: fn(&Options) -> Value) -> Endpoint {
    Endpoint::callback(move |options, responder| {
        tokio::spawn(async move {
            responder.ok(answer(&options));
        });
    })
}

fn callback_crud(find: fn(&Options) -> Value, find_by_id: fn(&Options) -> Value) -> Resource {
    Resource::new()
        .create(cb(|_| json!({ "created": true })))
        .find(cb(find))
        .find_by_id(cb(find_by_id))
        .delete_by_id(cb(|_| json!({ "deleted": true })))
        .update_by_id(cb(|_| json!({ "updated": true })))
        .replace_by_id(cb(|_| json!({ "replaced": true })))
}

fn callback_api() -> Router {
    let passenger = callback_crud(
        |o| cars()[id(o, "userId")][id(o, "carId")]["passengers"].clone(),
        |o| cars()[id(o, "userId")][id(o, "carId")]["passengers"][id(o, "passengerId")].clone(),
    );
    let car = callback_crud(
        |o| cars()[id(o, "userId")].clone(),
        |o| cars()[id(o, "userId")][id(o, "carId")].clone(),
    )
    .child("passenger", passenger);
    let user = callback_crud(|_| users(), |o| users()[id(o, "userId")].clone())
        .child("car", car)
        .action("me", Action::new(cb(|_| json!({ "me": true }))).http(Method::Get, false));

    Api::new(Resources::new().resource("user", user))
        .pre(|_: &mut Options, _: &Request| -> Result<(), Error> { Ok(()) })
        .build()
        .expect("valid resource map")
}

#[tokio::test]
async fn callback_handlers_serve_every_verb() {
    common::init_tracing();
    let app = callback_api();

    let res = get(&app, "/users").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.is_json());
    assert_eq!(res.json(), users());

    assert_eq!(get(&app, "/users/1").await.json(), users()[1]);

    let res = send(&app, "POST", "/users", &[], "").await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json(), json!({ "created": true }));

    let cases = [
        ("DELETE", json!({ "deleted": true })),
        ("PUT", json!({ "replaced": true })),
        ("PATCH", json!({ "updated": true })),
    ];
    for (method, expected) in cases {
        let res = send(&app, method, "/users/1", &[], "").await;
        assert_eq!(res.status, StatusCode::OK, "{method}");
        assert_eq!(res.json(), expected, "{method}");
    }

    assert_eq!(get(&app, "/users/me").await.json(), json!({ "me": true }));
}

#[tokio::test]
async fn nested_resources_mount_under_the_instance_path() {
    let app = callback_api();

    assert_eq!(get(&app, "/users/1/cars").await.json(), cars()[1]);
    assert_eq!(get(&app, "/users/1/cars/1").await.json(), cars()[1][1]);
    assert_eq!(send(&app, "POST", "/users/1/cars", &[], "").await.status, StatusCode::CREATED);
    assert_eq!(send(&app, "DELETE", "/users/1/cars/1", &[], "").await.json(), json!({ "deleted": true }));

    assert_eq!(get(&app, "/users/1/cars/1/passengers").await.json(), cars()[1][1]["passengers"]);
    assert_eq!(get(&app, "/users/1/cars/1/passengers/0").await.json(), json!({ "name": "todd" }));
    let res = send(&app, "POST", "/users/1/cars/1/passengers", &[], "").await;
    assert_eq!(res.status, StatusCode::CREATED);
    let res = send(&app, "PATCH", "/users/1/cars/1/passengers/1", &[], "").await;
    assert_eq!(res.json(), json!({ "updated": true }));
}

#[tokio::test]
async fn missing_instances_are_404() {
    let app = callback_api();
    let res = get(&app, "/users/9").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.body.is_empty());

    assert_eq!(get(&app, "/nothing").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn serves_the_route_index() {
    let app = callback_api();
    let res = get(&app, "/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.is_json());

    let verbs = |collection: &str, instance: &str| {
        json!({
            "create":      { "path": collection, "method": "post",   "instance": false },
            "find":        { "path": collection, "method": "get",    "instance": false },
            "findById":    { "path": instance,   "method": "get",    "instance": true },
            "deleteById":  { "path": instance,   "method": "delete", "instance": true },
            "updateById":  { "path": instance,   "method": "patch",  "instance": true },
            "replaceById": { "path": instance,   "method": "put",    "instance": true }
        })
    };
    let mut passenger = verbs(
        "/users/:userId/cars/:carId/passengers",
        "/users/:userId/cars/:carId/passengers/:passengerId",
    );
    let mut car = verbs("/users/:userId/cars", "/users/:userId/cars/:carId");
    car["passenger"] = passenger.take();
    let mut user = verbs("/users", "/users/:userId");
    user["car"] = car;
    user["me"] = json!({ "path": "/users/me", "method": "get", "instance": false });

    assert_eq!(res.json(), json!({ "user": user }));
}

#[tokio::test]
async fn future_handlers() {
    let user = Resource::new()
        .create(Endpoint::future(|_| async { Ok::<_, Error>(json!({ "created": true })) }))
        .find(Endpoint::future(|_| async { Ok::<_, Error>(users()) }))
        .find_by_id(Endpoint::future(|o| async move {
            tokio::task::yield_now().await;
            Ok::<_, Error>(users()[id(&o, "userId")].clone())
        }))
        .delete_by_id(Endpoint::future(|_| async { Err::<Value, _>(Error::forbidden()) }))
        .action(
            "me",
            Action::new(Endpoint::future(|_| async { Ok::<_, Error>(json!({ "me": true })) }))
                .http(Method::Get, false),
        );
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    assert_eq!(get(&app, "/users").await.json(), users());
    assert_eq!(get(&app, "/users/2").await.json(), users()[2]);
    assert_eq!(get(&app, "/users/me").await.json(), json!({ "me": true }));
    assert_eq!(send(&app, "POST", "/users", &[], "").await.status, StatusCode::CREATED);

    let res = send(&app, "DELETE", "/users/1", &[], "").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.json()["error"].is_string());
}

#[tokio::test]
async fn flat_and_sync_handlers() {
    let user = Resource::new()
        .create(Endpoint::value(json!({ "created": true })))
        .find(Endpoint::value(users()))
        .find_by_id(Endpoint::sync(|o| Ok(users()[id(&o, "userId")].clone())))
        .action("me", Action::new(Endpoint::sync(|_| Ok(json!({ "me": true })))).http(Method::Get, false))
        .action("isCool", Endpoint::sync(|_| Ok(json!(false))))
        .action("nulled", Action::new(Endpoint::sync(|_| Ok(Value::Null))).http(Method::Get, false));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    assert_eq!(get(&app, "/users").await.json(), users());
    assert_eq!(get(&app, "/users/1").await.json(), users()[1]);
    assert_eq!(get(&app, "/users/me").await.json(), json!({ "me": true }));

    let res = get(&app, "/users/123/isCool").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.is_json());
    assert_eq!(&res.body[..], b"false");

    assert_eq!(get(&app, "/users/nulled").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_false_drops_the_body() {
    let user = Resource::new().create(Endpoint::value(json!({ "created": true })));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    let res = send(&app, "POST", "/users?response=false", &[], "").await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(res.body.is_empty());
}

#[tokio::test]
async fn options_merge_params_query_and_body() {
    let user = Resource::new()
        .update_by_id(Endpoint::sync(|o| Ok(Value::Object(o.as_map().clone()))));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    let res = send(&app, "PATCH", "/users/7?userId=evil&sort=asc", &[], r#"{"sort":"desc","name":"bob"}"#).await;
    assert_eq!(res.json(), json!({ "userId": 7, "sort": "asc", "name": "bob" }));

    let res = send(&app, "PATCH", "/users/7", &[], "[1,2]").await;
    assert_eq!(res.json(), json!({ "userId": 7, "data": [1, 2] }));

    let res = send(&app, "PATCH", "/users/7", &[], "{nope").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hooks_wrap_every_route() {
    type Seen = Arc<Mutex<Vec<(Option<u16>, Option<String>)>>>;
    let seen: Seen = Arc::default();
    let log = Arc::clone(&seen);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let user = Resource::new()
        .find(Endpoint::sync(move |o| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "tenant": o.get("tenant") }))
        }))
        .delete_by_id(Endpoint::sync(|_| Err::<Value, _>(Error::server("boom"))));
    let app = Api::new(Resources::new().resource("user", user))
        .pre(|o: &mut Options, req: &Request| -> Result<(), Error> {
            if req.header("x-deny").is_some() {
                return Err(Error::unauthorized());
            }
            o.insert("tenant", "acme");
            Ok(())
        })
        .post(move |_: &Options, _: &Request, status: Option<StatusCode>, err: Option<&Error>| -> Result<(), Error> {
            let entry = (status.map(|s| s.as_u16()), err.map(ToString::to_string));
            log.lock().expect("lock").push(entry);
            Ok(())
        })
        .build()
        .expect("valid");

    assert_eq!(get(&app, "/users").await.json(), json!({ "tenant": "acme" }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(send(&app, "GET", "/users", &[("x-deny", "1")], "").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(send(&app, "DELETE", "/users/1", &[], "").await.status, StatusCode::INTERNAL_SERVER_ERROR);

    let seen = seen.lock().expect("lock").clone();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (Some(200), None));
    assert_eq!(seen[1].0, None);
    assert!(seen[1].1.is_some());
    assert_eq!(seen[2], (None, Some("boom".to_owned())));
}

#[tokio::test]
async fn hidden_endpoints_are_routed_but_not_indexed() {
    let user = Resource::new()
        .find(Endpoint::value(json!([])))
        .action("secret", Action::new(Endpoint::value(json!({ "shh": true })).hidden()).http(Method::Get, false));
    let app = Api::new(Resources::new().resource("user", user)).base("/api").build().expect("valid");

    assert_eq!(get(&app, "/api/users/secret").await.json(), json!({ "shh": true }));
    let index = get(&app, "/api").await.json();
    assert_eq!(index, json!({ "user": { "find": { "path": "/api/users", "method": "get", "instance": false } } }));
}

#[tokio::test]
async fn index_can_be_disabled() {
    let user = Resource::new().find(Endpoint::value(json!([])));
    let api = Api::new(Resources::new().resource("user", user)).index(false);
    assert!(api.meta().expect("meta")["user"]["find"].is_object());
    let app = api.build().expect("valid");
    assert_eq!(get(&app, "/").await.status, StatusCode::NOT_FOUND);
}

#[test]
fn malformed_maps_fail_to_build() {
    let empty = Resources::new().resource("user", Resource::new());
    assert!(matches!(Api::new(empty).build(), Err(Error::Config(_))));

    let bad_name = Resources::new().resource("us er", Resource::new().find(Endpoint::value(json!([]))));
    assert!(Api::new(bad_name).build().is_err());
}

#[tokio::test]
async fn wrong_method_is_405() {
    let user = Resource::new().find(Endpoint::value(json!([])));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");
    let res = send(&app, "DELETE", "/users", &[], "").await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.json()["error"].is_string());
}

#[tokio::test]
async fn path_params_are_percent_decoded_before_coercion() {
    let user = Resource::new()
        .find_by_id(Endpoint::sync(|o| Ok(json!({ "id": o.get("userId") }))))
        .child("car", Resource::new().find_by_id(Endpoint::sync(|o| Ok(json!({ "car": o.get("carId") })))));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    assert_eq!(get(&app, "/users/%31").await.json(), json!({ "id": 1 }));
    assert_eq!(get(&app, "/users/a%20b").await.json(), json!({ "id": "a b" }));
    assert_eq!(get(&app, "/users/1/cars/x%2Fy").await.json(), json!({ "car": "x/y" }));
    assert_eq!(get(&app, "/users/%FF").await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn head_and_trailing_slashes_reach_compiled_routes() {
    let user = Resource::new().find(Endpoint::value(json!([1])));
    let app = Api::new(Resources::new().resource("user", user)).build().expect("valid");

    assert_eq!(get(&app, "/users/").await.json(), json!([1]));
    assert_eq!(send(&app, "HEAD", "/users", &[], "").await.status, StatusCode::OK);
}
