//! Dispatch: simulated responses, transport failures, delays, typed responses.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert2::{check, let_assert};
use common::{Api, Call, StubTransport};
use courier::{
    Connector, ConnectorExt, Delay, Error, FromResponse, Hydrator, Method, MockClient,
    MockResponse, Request, Response, ResponseType, Result, Transport,
};
use serde::Deserialize;
use serde_json::{Value, json};

#[tokio::test]
async fn simulated_response_never_reaches_the_transport() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.test", &transport);
    let mock = MockClient::new().for_request::<Call>(MockResponse::json(json!({"id": 7}), 201));

    let mut call = Call::post("/users");
    call.query.add("dry_run", "true");
    let response = api.send_with_mock(&call, mock.clone()).expect("resolve").await.expect("send");

    check!(response.is_simulated());
    check!(response.status() == 201);
    check!(response.json::<Value>().expect("json") == json!({"id": 7}));
    check!(transport.calls() == 0);

    check!(mock.sent_count() == 1);
    check!(mock.was_sent_request::<Call>());
    let_assert!(Some(recorded) = mock.last_recorded());
    check!(recorded.method == Method::Post);
    check!(recorded.url == "https://api.test/users?dry_run=true");
    check!(recorded.status == Some(201));
}

#[tokio::test]
async fn transport_failure_is_wrapped_with_request_context() {
    let transport = StubTransport::ok().failing_on("/down");
    let api = Api::new("https://api.test", &transport);

    let error = api.send(&Call::get("/down")).expect("resolve").await.expect_err("must fail");

    check!(error.is_connection());
    let_assert!(Error::Transport { method, url, .. } = error);
    check!(method == Method::Get);
    check!(url == "https://api.test/down");
    check!(transport.calls() == 1);
}

#[tokio::test]
async fn simulated_connection_failure_uses_the_transport_error_path() {
    let transport = StubTransport::ok();
    let api = Api::new("https://api.test", &transport);
    let mock = MockClient::sequence([MockResponse::connection_error("no route to host")]);

    let error = api
        .send_with_mock(&Call::get("/flaky"), mock.clone())
        .expect("resolve")
        .await
        .expect_err("must fail");

    check!(error.is_connection());
    check!(transport.calls() == 0);
    let_assert!(Some(recorded) = mock.last_recorded());
    check!(recorded.status == None);
}

#[test]
fn resolution_errors_are_returned_by_send_itself() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.mock_client = Some(MockClient::new());

    let_assert!(Err(Error::NoMockResponse { method, url }) = api.send(&Call::get("/users")));
    check!(method == Method::Get);
    check!(url == "https://api.test/users");

    let mock = MockClient::new().for_url("api.test/other", MockResponse::ok());
    let_assert!(Err(Error::NoMockResponse { .. }) = api.send_with_mock(&Call::get("/users"), mock));
    check!(transport.calls() == 0);
}

#[tokio::test(start_paused = true)]
async fn delay_applies_to_real_sends_only() {
    let transport = StubTransport::ok();
    let mut api = Api::new("https://api.test", &transport);
    api.delay = Delay::from_millis(100);
    let mut call = Call::get("/slow");
    call.delay = Delay::from_millis(250);

    let start = tokio::time::Instant::now();
    api.send(&call).expect("resolve").await.expect("send");
    check!(start.elapsed() >= Duration::from_millis(250));

    let start = tokio::time::Instant::now();
    api.send_with_mock(&call, MockClient::sequence([MockResponse::ok()]))
        .expect("resolve")
        .await
        .expect("send");
    check!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn send_blocking_drives_the_transport() {
    let transport = StubTransport::new(200, r#"{"ok":true}"#);
    let api = Api::new("https://api.test", &transport);

    let response = api.send_blocking(&Call::get("/health")).expect("send");

    check!(!response.is_simulated());
    check!(response.json::<Value>().expect("json") == json!({"ok": true}));
    let sent = transport.sent();
    let_assert!([message] = sent.as_slice());
    check!(message.url().as_str() == "https://api.test/health");
    check!(message.header("User-Agent") == Some(courier::DEFAULT_USER_AGENT));
}

// ============================================================================
// Hydration and response types
// ============================================================================

#[derive(Debug, PartialEq, Deserialize)]
struct User {
    id: u64,
    name: String,
}

struct UserPage(Vec<User>);

impl FromResponse for UserPage {
    fn from_response(response: Response) -> Result<Self> {
        Ok(Self(response.dto()?))
    }
}

struct ListUsers;

impl Request for ListUsers {
    fn method(&self) -> Method {
        Method::Get
    }

    fn resolve_endpoint(&self) -> String {
        "/users".to_string()
    }

    fn response_type(&self) -> Option<ResponseType> {
        Some(ResponseType::of::<UserPage>())
    }

    fn hydrator(&self) -> Option<Hydrator> {
        Some(Arc::new(|response: &Response| -> Result<Value> {
            let mut body: Value = response.json()?;
            Ok(body["data"].take())
        }))
    }
}

struct Enveloped(StubTransport);

impl Connector for Enveloped {
    fn resolve_base_url(&self) -> String {
        "https://api.test".to_string()
    }

    fn hydrator(&self) -> Option<Hydrator> {
        Some(Arc::new(|_: &Response| -> Result<Value> {
            Err(Error::custom("connector hydrator must not run"))
        }))
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.0.shared()
    }
}

#[tokio::test]
async fn request_hydrator_and_response_type_drive_typed_conversion() {
    let transport = StubTransport::new(200, r#"{"data":[{"id":1,"name":"Ada"}]}"#);
    let api = Enveloped(transport.clone());

    let response = api.send(&ListUsers).expect("resolve").await.expect("send");
    check!(response.resolved_request().response_type().is::<UserPage>());

    let users: Vec<User> = response.dto().expect("dto");
    check!(
        users
            == [User {
                id: 1,
                name: "Ada".to_string(),
            }]
    );

    let wrong = response.clone().into_typed::<Response>();
    let_assert!(Err(Error::InvalidResponseType { requested, .. }) = wrong);
    check!(requested.ends_with("Response"));

    let_assert!(Ok(UserPage(page)) = response.into_typed::<UserPage>());
    check!(page.len() == 1);
}
