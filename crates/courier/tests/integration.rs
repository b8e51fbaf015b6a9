//! End-to-end tests: declared contracts calling a mock HTTP service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use courier::{
    CallHandle, ClientConfig, ClientRegistry, Error, MockTransport, SharedTransport, Transport,
    WorkerPool,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    total: u32,
}

courier::service_contract! {
    /// Order service used throughout these tests.
    #[service(id = "orders", version = "1.0.0", description = "order lookups")]
    pub trait OrderService as OrderServiceProxy {
        #[method(name = "getOrder", timeout_ms = 1000, retry_count = 2, retry_interval_ms = 100, params = ["orderId"])]
        blocking fn get_order(order_id: String) -> Order;

        #[method(name = "getOrder", timeout_ms = 300)]
        blocking fn get_order_quickly(order_id: String) -> Order;

        #[method(name = "placeOrder", required = ["customerId"])]
        future fn place_order(customer_id: String, items: Vec<String>) -> Order;

        #[method(name = "cancelOrder", retry_count = 3, retry_interval_ms = 10)]
        blocking fn cancel_order(order_id: String) -> bool;

        #[method(name = "placeOrder", timeout_ms = 100)]
        future fn place_order_with_deadline(customer_id: String) -> Order;

        #[method(name = "listOrders", timeout_ms = 100)]
        deferred fn list_orders(customer_id: String) -> Vec<Order>;
    }
}

fn pool() -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(4).unwrap())
}

fn http_client(server: &MockServer) -> SharedTransport {
    let registry = ClientRegistry::new();
    registry
        .create_client("orders", ClientConfig::new(format!("{}/api/v1", server.uri())))
        .unwrap()
}

fn order_body(id: &str) -> serde_json::Value {
    json!({"code": "SUCCESS", "message": "ok", "data": {"id": id, "total": 42}})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_call_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/services/orders/methods/getOrder"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "serviceId": "orders",
            "methodName": "getOrder",
            "params": {"orderId": "A-17"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_body("A-17")))
        .expect(1)
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();
    let order = orders.get_order("A-17".to_string()).unwrap();
    assert_eq!(
        order,
        Order {
            id: "A-17".to_string(),
            total: 42
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_body("B-2")))
        .expect(1)
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();

    let started = Instant::now();
    let order = orders.get_order("B-2".to_string()).unwrap();
    assert_eq!(order.id, "B-2");
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": "ERROR", "message": "order already shipped"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();
    match orders.cancel_order("C-3".to_string()) {
        Err(Error::Remote { message, .. }) => assert_eq!(message, "order already shipped"),
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exhausted_retries_name_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();
    let err = orders.cancel_order("C-3".to_string()).unwrap_err();
    match &err {
        Error::RetriesExhausted {
            service,
            method,
            attempts,
            ..
        } => {
            assert_eq!(service, "orders");
            assert_eq!(method, "cancelOrder");
            assert_eq!(*attempts, 4);
        }
        other => panic!("expected exhausted error, got {:?}", other),
    }
    assert!(matches!(err.root_cause(), Error::Unavailable { status: 502, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/services/orders/methods/cancelOrder"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();
    let err = orders.cancel_order("G-7".to_string()).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn test_async_handles_reject_on_timeout() {
    let mock = Arc::new(MockTransport::new().with_delay(Duration::from_secs(5)));
    let orders = OrderServiceProxy::synthesize_with_pool(mock.clone(), pool()).unwrap();

    let started = Instant::now();
    let handle = orders
        .place_order_with_deadline("cust-9".to_string())
        .unwrap();
    assert!(matches!(handle.await, Err(Error::Timeout { .. })));

    let deferred = orders.list_orders("cust-9".to_string()).unwrap();
    assert!(matches!(deferred.await, Err(Error::Timeout { .. })));

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(mock.attempt_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unresponsive_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(order_body("D-4"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let orders = OrderServiceProxy::synthesize_with_pool(http_client(&server), pool()).unwrap();

    let started = Instant::now();
    let err = orders.get_order_quickly("D-4".to_string()).unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_millis(300) + Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_future_call_does_not_block_caller() {
    let mock = Arc::new(
        MockTransport::replying(json!({"id": "E-5", "total": 7}))
            .with_delay(Duration::from_millis(50)),
    );
    let orders = OrderServiceProxy::synthesize_with_pool(mock.clone(), pool()).unwrap();

    let started = Instant::now();
    let handle: CallHandle<Order> = orders
        .place_order("cust-1".to_string(), vec!["sku-1".to_string()])
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));

    let order = handle.await.unwrap();
    assert_eq!(order.id, "E-5");
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_millis(50) + Duration::from_secs(1));

    let sent = &mock.requests()[0];
    assert_eq!(sent.params["customerId"], "cust-1");
    assert_eq!(sent.params["param2"], json!(["sku-1"]));
}

#[tokio::test]
async fn test_validation_error_surfaces_before_handle() {
    let mock = Arc::new(MockTransport::new());
    let orders = OrderServiceProxy::synthesize_with_pool(mock.clone(), pool()).unwrap();

    let err = orders.place_order(String::new(), vec![]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(mock.attempt_count(), 0);
}

#[test]
fn test_concurrent_callers_share_one_proxy() {
    let mock = Arc::new(MockTransport::replying(json!({"id": "F", "total": 1})));
    let orders = OrderServiceProxy::synthesize_with_pool(mock.clone(), pool()).unwrap();

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let orders = orders.clone();
            std::thread::spawn(move || orders.get_order(format!("F-{}", i)))
        })
        .collect();
    for thread in threads {
        assert!(thread.join().unwrap().is_ok());
    }

    let mut ids: Vec<_> = mock
        .requests()
        .into_iter()
        .map(|r| r.request_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn test_registry_lifecycle() {
    let registry = ClientRegistry::new();
    let client = registry
        .create_client("a", ClientConfig::new("http://localhost:1/api"))
        .unwrap();
    assert!(Arc::ptr_eq(&client, &registry.get_client("a").unwrap()));

    assert!(registry.remove_client("a"));
    assert!(registry.get_client("a").is_none());
    assert!(client.is_shutdown());

    // A removed client refuses further calls
    let orders = OrderServiceProxy::synthesize_with_pool(client, pool()).unwrap();
    let handle = orders.place_order("c".to_string(), vec![]).unwrap();
    assert!(matches!(handle.await, Err(Error::Shutdown)));
}

#[test]
fn test_shutdown_all_with_failing_client() {
    let registry = ClientRegistry::new();
    let healthy_a = Arc::new(MockTransport::new());
    let broken = Arc::new(MockTransport::new().with_failing_shutdown());
    let healthy_b = Arc::new(MockTransport::new());
    for mock in [&healthy_a, &broken, &healthy_b] {
        mock.initialize().unwrap();
    }

    registry.register("a", healthy_a.clone()).unwrap();
    registry.register("broken", broken.clone()).unwrap();
    registry.register("b", healthy_b.clone()).unwrap();

    registry.shutdown_all();

    assert!(healthy_a.is_shutdown());
    assert!(healthy_b.is_shutdown());
    assert_eq!(registry.client_count(), 0);
}

#[tokio::test]
async fn test_events_models_and_health() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events/publish"))
        .and(body_partial_json(json!({"eventType": "order.shipped"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/models/ranker/invoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 0.9})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;

    let client = http_client(&server);
    assert!(client.health_check().await);

    let event = courier::EventEnvelope::new("order.shipped", courier::Params::new());
    assert!(client.publish_event(&event).await.unwrap());

    let reply = client
        .invoke_model("ranker", json!({"query": "boots"}))
        .await
        .unwrap();
    assert_eq!(reply["score"], 0.9);
}

#[tokio::test]
async fn test_client_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer file-token"))
        .and(header("x-app-id", "billing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("paid")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("client.toml");
    std::fs::write(
        &file,
        format!(
            "[client]\nbase_url = \"{}/api/v1\"\nauth_token = \"file-token\"\napp_id = \"billing\"\nmax_retries = 0\n",
            server.uri()
        ),
    )
    .unwrap();

    let config = courier::config::load_client_config_file(&file).unwrap();
    let transport = courier::HttpTransport::new(config).unwrap();
    let reply = transport
        .invoke_service("billing", "charge", courier::Params::new())
        .await
        .unwrap();
    assert_eq!(reply, json!("paid"));
}
