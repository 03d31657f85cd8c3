//! Resolution protocol: merge precedence, URI construction, bodies,
//! capabilities and authentication.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use common::{Api, Call, StubTransport};
use courier::{
    AcceptsJson, Body, Capability, ConnectorExt, Error, FixedBoundary, GlobalConfig, HasTimeout,
    Headers, JsonApi, MockClient, MockResponse, Part, PendingRequest, Query, Result,
    TokenAuthenticator, UserAgent,
};
use serde_json::json;

fn header_pairs(pending: &PendingRequest) -> Vec<(String, String)> {
    pending
        .headers()
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn request_headers_override_connector_headers_and_default_user_agent() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.global = Arc::new(GlobalConfig::builder().user_agent("courier-tests").build());
    api.headers = Headers::from([("X-Shared", "connector"), ("X-Connector", "c")]);

    let mut call = Call::get("/users");
    call.headers = Headers::from([("X-Shared", "request"), ("User-Agent", "custom")]);

    let resolved = api.resolve(&call, None, false).expect("resolve");

    assert_eq!(
        header_pairs(&resolved),
        [
            ("User-Agent".to_string(), "custom".to_string()),
            ("X-Shared".to_string(), "request".to_string()),
            ("X-Connector".to_string(), "c".to_string()),
        ]
    );
}

#[test]
fn default_user_agent_is_sent_unless_disabled() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);

    let resolved = api.resolve(&Call::get("/"), None, false).expect("resolve");
    assert_eq!(
        resolved.headers().get("User-Agent").map(String::as_str),
        Some(courier::DEFAULT_USER_AGENT)
    );

    api.global = Arc::new(GlobalConfig::builder().without_user_agent().build());
    let resolved = api.resolve(&Call::get("/"), None, false).expect("resolve");
    assert!(!resolved.headers().has("User-Agent"));
}

#[test]
fn query_and_config_follow_the_same_precedence() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.query = Query::from([("page", "1"), ("api_version", "2")]);
    api.config.add("timeout", json!(5));

    let mut call = Call::get("/items");
    call.query = Query::from([("page", "3")]);
    call.config.add("timeout", json!(1.5));

    let resolved = api.resolve(&call, None, false).expect("resolve");
    assert_eq!(
        resolved.uri().expect("uri").as_str(),
        "https://api.test/items?page=3&api_version=2"
    );
    assert_eq!(resolved.timeout().expect("timeout"), Some(Duration::from_millis(1500)));
}

#[test]
fn existing_query_string_is_kept_and_request_query_merged_on_top() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.example.com", &transport);
    let mut call = Call::get("/users?active=1");
    call.query = Query::from([("sort", "name")]);

    let resolved = api.resolve(&call, None, false).expect("resolve");

    assert_eq!(
        resolved.uri().expect("uri").as_str(),
        "https://api.example.com/users?active=1&sort=name"
    );
}

#[test]
fn request_query_wins_over_query_already_in_the_endpoint() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.example.com/", &transport);
    let mut call = Call::get("users?active=1");
    call.query = Query::from([("active", "0")]);

    let resolved = api.resolve(&call, None, false).expect("resolve");

    assert_eq!(
        resolved.uri().expect("uri").as_str(),
        "https://api.example.com/users?active=0"
    );
}

#[test]
fn request_body_is_used_as_is_when_connector_has_none() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.test", &transport);
    let mut call = Call::post("/things");
    call.body = Some(Body::json(&json!({"a": 1})).expect("json body"));

    let resolved = api.resolve(&call, None, false).expect("resolve");

    let_assert!(Some(body) = resolved.body());
    assert_eq!(body, &Body::json(&json!({"a": 1})).expect("json body"));
}

#[test]
fn mergeable_bodies_are_merged_with_request_winning() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.body = Some(Body::json(&json!({"a": 1})).expect("json body"));
    let mut call = Call::post("/things");
    call.body = Some(Body::json(&json!({"a": 2, "b": 3})).expect("json body"));

    let resolved = api.resolve(&call, None, false).expect("resolve");

    let_assert!(Some(body) = resolved.body());
    assert_eq!(body.as_json(), json!({"a": 2, "b": 3}).as_object());
}

#[test]
fn form_bodies_merge_key_wise() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.body = Some(Body::form([("client_id", "abc"), ("scope", "read")]));
    let mut call = Call::post("/token");
    call.body = Some(Body::form([("scope", "write"), ("grant_type", "code")]));

    let resolved = api.resolve(&call, None, false).expect("resolve");
    let message = resolved.create_http_request().expect("message");

    assert_eq!(
        message.header("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(
        message.body().map(|body| body.as_ref()),
        Some(&b"client_id=abc&scope=write&grant_type=code"[..])
    );
}

#[test]
fn opaque_request_body_replaces_connector_body() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.body = Some(Body::text("from connector"));
    let mut call = Call::post("/notes");
    call.body = Some(Body::text("from request"));

    let resolved = api.resolve(&call, None, false).expect("resolve");

    assert_eq!(resolved.body(), Some(&Body::text("from request")));
}

#[test]
fn body_kind_mismatch_fails_before_any_dispatch() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.body = Some(Body::form([("a", "1")]));
    let mut call = Call::post("/things");
    call.body = Some(Body::json(&json!({"a": 1})).expect("json body"));

    let result = api.send_blocking(&call);

    let_assert!(Err(Error::BodyTypeMismatch { connector, request }) = result);
    check!(connector == "form");
    check!(request == "json");
    check!(transport.calls() == 0);
}

#[test]
fn multipart_body_gets_the_global_stream_factory() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.global = Arc::new(
        GlobalConfig::builder()
            .stream_factory(FixedBoundary("test-boundary".to_string()))
            .build(),
    );
    let mut call = Call::post("/upload");
    call.headers = Headers::from([("Content-Type", "text/plain")]);
    call.body = Some(Body::multipart([Part::text("title", "report")]));

    let resolved = api.resolve(&call, None, false).expect("resolve");
    let_assert!(Some(multipart) = resolved.body().and_then(Body::as_multipart));
    check!(multipart.has_stream_factory());

    let message = resolved.create_http_request().expect("message");
    let content_types = message
        .headers()
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("Content-Type"))
        .count();
    check!(content_types == 1);
    check!(message.header("Content-Type") == Some("multipart/form-data; boundary=test-boundary"));
}

#[test]
fn explicit_content_type_header_is_kept_for_json() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.test", &transport);
    let mut call = Call::post("/things");
    call.headers = Headers::from([("content-type", "application/vnd.api+json")]);
    call.body = Some(Body::json(&json!({"a": 1})).expect("json body"));

    let message = api
        .resolve(&call, None, false)
        .and_then(|resolved| resolved.create_http_request())
        .expect("message");

    assert_eq!(message.header("Content-Type"), Some("application/vnd.api+json"));
    assert_eq!(message.body().map(|body| body.as_ref()), Some(&br#"{"a":1}"#[..]));
}

// ============================================================================
// Capabilities
// ============================================================================

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    nested: Vec<Arc<dyn Capability>>,
}

impl Capability for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        self.nested.clone()
    }

    fn boot(&self, _pending: &mut PendingRequest) -> Result<()> {
        self.log.lock().expect("log").push(self.name);
        Ok(())
    }
}

fn recorder(
    name: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
    nested: Vec<Arc<dyn Capability>>,
) -> Arc<dyn Capability> {
    Arc::new(Recorder {
        name,
        log: Arc::clone(log),
        nested,
    })
}

#[test]
fn capabilities_boot_connector_first_then_request_with_nested_discovery() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.capabilities = vec![
        recorder("c1", &log, vec![recorder("c1.nested", &log, Vec::new())]),
        recorder("c2", &log, Vec::new()),
    ];
    let mut call = Call::get("/");
    call.capabilities = vec![recorder("r1", &log, Vec::new())];

    api.resolve(&call, None, false).expect("resolve");

    assert_eq!(*log.lock().expect("log"), ["c1", "c1.nested", "c2", "r1"]);
}

#[test]
fn capability_boot_error_aborts_resolution_unchanged() {
    struct Broken;

    impl Capability for Broken {
        fn boot(&self, _pending: &mut PendingRequest) -> Result<()> {
            Err(Error::custom("tenant missing"))
        }
    }

    let transport = StubTransport::ok();
    let api = Api::new("https://api.test", &transport);
    let mut call = Call::get("/");
    call.capabilities = vec![Arc::new(Broken)];

    let result = api.send_blocking(&call);

    let_assert!(Err(Error::Custom(error)) = result);
    check!(error.to_string() == "tenant missing");
    check!(transport.calls() == 0);
}

#[test]
fn ready_made_capabilities_apply_their_settings() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.capabilities = vec![Arc::new(JsonApi), Arc::new(UserAgent::new("acme/1.0"))];
    let mut call = Call::get("/");
    call.capabilities = vec![
        Arc::new(AcceptsJson),
        Arc::new(HasTimeout {
            request: Duration::from_secs(2),
            connect: Duration::from_secs(1),
        }),
    ];

    let resolved = api.resolve(&call, None, false).expect("resolve");

    check!(resolved.headers().get("Accept").map(String::as_str) == Some("application/json"));
    check!(resolved.headers().get("User-Agent").map(String::as_str) == Some("acme/1.0"));
    check!(resolved.timeout().expect("timeout") == Some(Duration::from_secs(2)));
    check!(resolved
        .middleware()
        .response_pipe_names()
        .contains(&"always_throw_on_errors"));
}

// ============================================================================
// Authentication, boot hooks, mock precedence
// ============================================================================

#[test]
fn request_authenticator_wins_and_runs_after_boot_hooks() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.authenticator = Some(Arc::new(TokenAuthenticator::new("connector-token")));
    let mut call = Call::get("/me");
    call.authenticator = Some(Arc::new(TokenAuthenticator::new("request-token")));
    call.boot = Some(Arc::new(|pending: &mut PendingRequest| -> Result<()> {
        pending.headers_mut().add("Authorization", "set-by-boot");
        Ok(())
    }));

    let resolved = api.resolve(&call, None, false).expect("resolve");

    assert_eq!(
        resolved.headers().get("Authorization").map(String::as_str),
        Some("Bearer request-token")
    );
}

#[test]
fn resolved_request_can_be_reauthenticated_into_a_new_value() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.authenticator = Some(Arc::new(TokenAuthenticator::new("expired")));

    let resolved = api.resolve(&Call::get("/me"), None, false).expect("resolve");
    let refreshed = resolved
        .clone()
        .authenticate(Arc::new(TokenAuthenticator::new("fresh")))
        .expect("authenticate");

    check!(resolved.headers().get("Authorization").map(String::as_str) == Some("Bearer expired"));
    check!(refreshed.headers().get("Authorization").map(String::as_str) == Some("Bearer fresh"));
}

fn simulated_body(pending: &PendingRequest) -> Option<String> {
    pending
        .simulated_response()
        .map(|response| String::from_utf8_lossy(response.body()).into_owned())
}

#[test]
fn mock_client_precedence_is_explicit_then_request_then_connector() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.mock_client = Some(MockClient::sequence([MockResponse::text("connector", 200)]));
    let mut call = Call::get("/");
    call.mock_client = Some(MockClient::sequence([MockResponse::text("request", 200)]));

    let from_request = api.resolve(&call, None, false).expect("resolve");
    check!(simulated_body(&from_request).as_deref() == Some("request"));

    let explicit = MockClient::sequence([MockResponse::text("explicit", 200)]);
    let from_argument = api.resolve(&call, Some(explicit), false).expect("resolve");
    check!(simulated_body(&from_argument).as_deref() == Some("explicit"));

    let from_connector = api.resolve(&Call::get("/"), None, false).expect("resolve");
    check!(simulated_body(&from_connector).as_deref() == Some("connector"));
}

#[test]
fn unmatched_mock_fails_resolution() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.mock_client = Some(MockClient::new().for_url("api.test/other", MockResponse::ok()));

    let result = api.resolve(&Call::get("/users"), None, false);

    let_assert!(Err(Error::NoMockResponse { url, .. }) = result);
    check!(url == "https://api.test/users");
}
