mod common;
use common::*;
use mockito::{Matcher, Server};
use sun2000_logger::channels::Channels;
use sun2000_logger::config;
use sun2000_logger::influx::Influx;
use sun2000_logger::sink::{self, MeasurementSink, Snapshot};

fn influx(url: &str, mode: &str, enabled: bool) -> Influx {
    let config: config::Influx = serde_yaml::from_str(&format!(
        "enabled: {}\nurl: {}\ntoken: t0k3n\norg: home\nbucket: solar\nmode: {}\n",
        enabled, url, mode
    ))
    .unwrap();

    Influx::new(config, Channels::new()).unwrap()
}

fn electricity() -> Snapshot {
    let mut snapshot = Snapshot::new(sink::ELECTRICITY);
    snapshot.insert("active_power", 9900i64);
    snapshot.insert("phase_a_voltage", 230.1);
    snapshot.insert("status_string", "Starting");
    snapshot
}

fn write_matcher() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("org".into(), "home".into()),
        Matcher::UrlEncoded("bucket".into(), "solar".into()),
        Matcher::UrlEncoded("precision".into(), "ns".into()),
    ])
}

#[tokio::test]
async fn synchronous_write_is_delivered() {
    common_setup();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/write")
        .match_query(write_matcher())
        .match_header("authorization", "Token t0k3n")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("^electricity,location=lt ".into()),
            Matcher::Regex("active_power=9900i".into()),
            Matcher::Regex("phase_a_voltage=230.1".into()),
            Matcher::Regex("status_string=\"Starting\"".into()),
        ]))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let influx = influx(&server.url(), "synchronous", true);
    influx.write(&electricity()).await;

    mock.assert_async().await;
    assert_eq!(influx.written(), 1);
    assert_eq!(influx.failed(), 0);
}

#[tokio::test]
async fn rejected_write_is_dropped() {
    common_setup();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/write")
        .match_query(write_matcher())
        .with_status(500)
        .with_body("{\"code\":\"internal error\"}")
        .expect(2)
        .create_async()
        .await;

    let influx = influx(&server.url(), "synchronous", true);
    influx.write(&electricity()).await;
    influx.write(&electricity()).await;

    // no retries, one request per point
    mock.assert_async().await;
    assert_eq!(influx.written(), 0);
    assert_eq!(influx.failed(), 2);
}

#[tokio::test]
async fn unreachable_server_is_not_fatal() {
    common_setup();

    // nothing listens on the discard port
    let influx = influx("http://127.0.0.1:9", "synchronous", true);
    influx.write(&electricity()).await;

    assert_eq!(influx.written(), 0);
    assert_eq!(influx.failed(), 1);
}

#[tokio::test]
async fn asynchronous_write_goes_through_sender() {
    common_setup();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/write")
        .match_query(write_matcher())
        .match_header("authorization", "Token t0k3n")
        .match_body(Matcher::Regex("^device,location=lt ".into()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let influx = influx(&server.url(), "asynchronous", true);
    let handle = influx.start().expect("sender not started");

    let mut snapshot = Snapshot::new(sink::DEVICE);
    snapshot.insert("model", "SUN2000-10KTL");
    influx.write(&snapshot).await;

    influx.stop();
    handle.await.unwrap();

    mock.assert_async().await;
    assert_eq!(influx.written(), 1);
}

#[tokio::test]
async fn asynchronous_write_without_sender_is_dropped() {
    common_setup();

    let influx = influx("http://127.0.0.1:9", "asynchronous", true);
    influx.write(&electricity()).await;

    assert_eq!(influx.written(), 0);
    assert_eq!(influx.failed(), 1);
}

#[tokio::test]
async fn synchronous_mode_spawns_nothing() {
    common_setup();

    let influx = influx("http://127.0.0.1:9", "synchronous", true);
    assert!(influx.start().is_none());
}

#[tokio::test]
async fn disabled_sink_only_logs() {
    common_setup();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let influx = influx(&server.url(), "synchronous", false);
    assert!(influx.start().is_none());
    influx.write(&electricity()).await;

    mock.assert_async().await;
    assert_eq!(influx.written(), 0);
    assert_eq!(influx.failed(), 0);
}
