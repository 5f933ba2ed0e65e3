use futures::StreamExt;
use log::{error, info};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::filters::path::Tail;
use warp::http::{StatusCode, Uri};
use warp::sse::Event;
use warp::{reply, Filter, Rejection, Reply};

use super::assets::serve_asset;
use super::types::{
    ApiError, MessageResponse, PingRequest, PublishRequest, ServiceState, SystemResponse,
    VendorResponse,
};
use crate::error_handling::types::{LifecycleError, PingError};
use crate::pubsub::GapDetectingSubscriber;

const JSON_BODY_LIMIT: u64 = 16 * 1024;

fn with_state(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (Arc<ServiceState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn error_reply(status: StatusCode, message: String) -> reply::Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}

fn message_reply(message: String) -> reply::Response {
    reply::with_status(reply::json(&MessageResponse { message }), StatusCode::OK).into_response()
}

/// All routes of the service.
pub fn routes(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    index_route()
        .or(static_route())
        .or(stream_route(state.clone()))
        .or(publish_route(state.clone()))
        .or(stop_route(state.clone()))
        .or(status_route(state.clone()))
        .or(ping_route(state.clone()))
        .or(vendor_route(state.clone()))
        .or(system_route(state))
}

/// GET / -> /static/index.html
pub fn index_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(|| warp::redirect::see_other(Uri::from_static("/static/index.html")))
}

/// GET /static/{path}
pub fn static_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("static")
        .and(warp::get())
        .and(warp::path::tail())
        .map(|tail: Tail| serve_asset(tail.as_str()))
}

/// GET /stream
///
/// One subscriber per client, streamed as server-sent events until the client
/// goes away.
pub fn stream_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("stream")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: Arc<ServiceState>| {
            let subscriber = GapDetectingSubscriber::new(
                state.pubsub_endpoint.clone(),
                state.reconnect_interval,
            );
            info!("[{}] Stream client connected", subscriber.id());
            let events = subscriber
                .into_stream()
                .map(|pair| Ok::<_, Infallible>(Event::default().data(pair.to_string())));
            warp::sse::reply(warp::sse::keep_alive().stream(events))
        })
}

/// POST /publish {interface, timeout?}
pub fn publish_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("publish")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(|request: PublishRequest, state: Arc<ServiceState>| async move {
            let timeout = request
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(state.default_timeout);
            let res = match state.lifecycle.start(&request.interface, timeout).await {
                Ok(status) => message_reply(format!(
                    "Started capture on interface {} (pid {})",
                    request.interface,
                    status.process_id.unwrap_or_default()
                )),
                Err(e @ LifecycleError::InvalidInterface(_)) => {
                    error_reply(StatusCode::BAD_REQUEST, e.to_string())
                }
                Err(e) => {
                    error!("Unable to start capture on {}: {}", request.interface, e);
                    error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            };
            Ok::<_, Rejection>(res)
        })
}

/// POST /stop
pub fn stop_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("stop")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state))
        .and_then(|state: Arc<ServiceState>| async move {
            let res = match state.lifecycle.stop().await {
                Ok(Some(_)) => message_reply("Capture stopped".to_string()),
                Ok(None) => message_reply("No capture running".to_string()),
                Err(e) => {
                    error!("Unable to stop capture: {}", e);
                    error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            };
            Ok::<_, Rejection>(res)
        })
}

/// GET /status
pub fn status_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: Arc<ServiceState>| reply::json(&state.lifecycle.status()))
}

/// POST /ping {network}
///
/// Replies once every host has been pinged. Unanswered pings are not errors.
pub fn ping_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("ping")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(JSON_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(|request: PingRequest, state: Arc<ServiceState>| async move {
            let res = match state.sweeper.sweep(&request.network).await {
                Ok(_) => message_reply(format!(
                    "Ping requests sent for subnet: {}",
                    request.network
                )),
                Err(e @ PingError::InvalidNetworkSpec(_))
                | Err(e @ PingError::TooManyHosts { .. }) => {
                    error_reply(StatusCode::BAD_REQUEST, e.to_string())
                }
            };
            Ok::<_, Rejection>(res)
        })
}

/// GET /vendor/{mac}
pub fn vendor_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("vendor" / String)
        .and(warp::get())
        .and(with_state(state))
        .map(|mac: String, state: Arc<ServiceState>| {
            let vendor = state.vendors.vendor(&mac).unwrap_or_default();
            reply::json(&VendorResponse { vendor })
        })
}

/// GET /system/{mac}
pub fn system_route(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("system" / String)
        .and(warp::get())
        .and(with_state(state))
        .map(|mac: String, state: Arc<ServiceState>| {
            let system = state.systems.system(&mac).unwrap_or_default().to_string();
            reply::json(&SystemResponse { system })
        })
}

/// Turns rejections into the JSON error body used everywhere else.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let res = if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply(StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::AddressPair;
    use crate::configuration::PingSettings;
    use crate::lifecycle::{CaptureCommand, CaptureState, ProcessLifecycleManager};
    use crate::lookup::{SystemTable, VendorLookup};
    use crate::network::PingSweeper;
    use crate::pubsub::SequencedPublisher;
    use pnet::util::MacAddr;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    struct FixedVendors;

    impl VendorLookup for FixedVendors {
        fn vendor(&self, mac: &str) -> Option<String> {
            mac.to_lowercase()
                .starts_with("b8:27:eb")
                .then(|| "Raspberry Pi Foundation".to_string())
        }
    }

    // Helper to build state around a `sleep` capture process and a given pub/sub endpoint
    fn state_with_endpoint(endpoint: String) -> Arc<ServiceState> {
        let mut systems = HashMap::new();
        systems.insert("b8:27:eb".to_string(), "Sensor hub".to_string());
        Arc::new(ServiceState {
            lifecycle: ProcessLifecycleManager::new(
                CaptureCommand::new("sleep", vec!["30".to_string()]),
                Duration::from_secs(2),
            ),
            vendors: Arc::new(FixedVendors),
            systems: SystemTable::new(systems),
            sweeper: PingSweeper::new(PingSettings {
                program: "/nonexistent/ping".to_string(),
                max_hosts: 16,
                ..PingSettings::default()
            }),
            pubsub_endpoint: endpoint,
            reconnect_interval: Duration::from_millis(20),
            default_timeout: Duration::from_secs(300),
        })
    }

    fn state() -> Arc<ServiceState> {
        state_with_endpoint("127.0.0.1:9".to_string())
    }

    fn body_json<B: AsRef<[u8]>>(res: &warp::http::Response<B>) -> serde_json::Value {
        serde_json::from_slice(res.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_root_redirects_to_index() {
        let res = warp::test::request().path("/").reply(&routes(state())).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/static/index.html");
    }

    #[tokio::test]
    async fn test_static_index() {
        let res = warp::test::request()
            .path("/static/index.html")
            .reply(&routes(state()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/html");
    }

    #[tokio::test]
    async fn test_vendor_lookup_hit_and_miss() {
        let routes = routes(state());
        let res = warp::test::request()
            .path("/vendor/B8:27:EB:00:00:01")
            .reply(&routes)
            .await;
        assert_eq!(body_json(&res)["vendor"], "Raspberry Pi Foundation");

        let res = warp::test::request()
            .path("/vendor/00:00:00:00:00:01")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(&res)["vendor"], "");
    }

    #[tokio::test]
    async fn test_system_lookup_hit_and_miss() {
        let routes = routes(state());
        let res = warp::test::request()
            .path("/system/b8:27:eb:12:34:56")
            .reply(&routes)
            .await;
        assert_eq!(body_json(&res)["system"], "Sensor hub");

        let res = warp::test::request().path("/system/b8").reply(&routes).await;
        assert_eq!(body_json(&res)["system"], "");
    }

    #[tokio::test]
    async fn test_ping_reports_success_even_without_answers() {
        let res = warp::test::request()
            .method("POST")
            .path("/ping")
            .json(&serde_json::json!({ "network": "10.0.0.0/30" }))
            .reply(&routes(state()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(&res)["message"],
            "Ping requests sent for subnet: 10.0.0.0/30"
        );
    }

    #[tokio::test]
    async fn test_ping_rejects_bad_networks() {
        let routes = routes(state());
        for network in ["10.0.0.0/99", "10.0.0.0/24", "10.0.0.7/30"] {
            let res = warp::test::request()
                .method("POST")
                .path("/ping")
                .json(&serde_json::json!({ "network": network }))
                .reply(&routes)
                .await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", network);
            assert!(body_json(&res)["message"].is_string());
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_publish_stop_and_status() {
        let state = state();
        let routes = routes(state.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/publish")
            .json(&serde_json::json!({ "interface": "eth0" }))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(state.lifecycle.state(), CaptureState::Running);

        let res = warp::test::request().path("/status").reply(&routes).await;
        let status = body_json(&res);
        assert_eq!(status["state"], "running");
        assert_eq!(status["interface"], "eth0");
        assert!(status["expires_at"].is_string());

        let res = warp::test::request()
            .method("POST")
            .path("/stop")
            .reply(&routes)
            .await;
        assert_eq!(body_json(&res)["message"], "Capture stopped");
        assert_eq!(state.lifecycle.state(), CaptureState::Idle);
    }

    #[tokio::test]
    #[serial]
    async fn test_publish_rejects_bad_interface() {
        let state = state();
        let res = warp::test::request()
            .method("POST")
            .path("/publish")
            .json(&serde_json::json!({ "interface": "--help", "timeout": 5 }))
            .reply(&routes(state.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.lifecycle.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_rejections_become_json() {
        let filter = routes(state()).recover(handle_rejection);
        let res = warp::test::request()
            .path("/no/such/route")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request()
            .method("POST")
            .path("/ping")
            .header("content-type", "application/json")
            .body("{\"net\": 1}")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(&res)["message"].is_string());
    }

    #[tokio::test]
    async fn test_stream_subscribes_and_stays_open() {
        let publisher = SequencedPublisher::bind("127.0.0.1:0", 16).await.unwrap();
        let routes = routes(state_with_endpoint(
            publisher.socket().local_addr().to_string(),
        ));

        // the event stream is endless, so the request can only time out
        let request = tokio::time::timeout(
            Duration::from_secs(1),
            warp::test::request().path("/stream").reply(&routes),
        );
        let attach = async {
            tokio::time::timeout(Duration::from_secs(5), async {
                while publisher.socket().subscriber_count() == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .expect("stream never subscribed");
            publisher.publish(AddressPair::new(
                MacAddr::new(0, 0x11, 0x22, 0x33, 0x44, 0x55),
                Some(Ipv4Addr::new(10, 0, 0, 1)),
            ));
        };

        let (reply, ()) = tokio::join!(request, attach);
        assert!(reply.is_err(), "event stream ended on its own");
    }
}
