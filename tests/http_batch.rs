use fanout::fanout::{BatchOutcome, BatchStatus, FanOutEngine};
use fanout::fetcher::{Fetcher, HttpFetcher, build_client};
use fanout::output::{self, discard::DiscardOutput, file::FileOutput};
use fanout::source::{AddressSource, HttpSource};
use fanout::Error;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves `body` under a `Content-Length` larger than the body, then closes the
/// connection, so every response ends with a read error.
async fn truncated_server(body: impl Into<String>) -> String {
    let body: Arc<str> = body.into().into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
                    body.len() + 1000
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.flush().await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn list_body(server: &MockServer, routes: &[&str]) -> String {
    routes
        .iter()
        .map(|r| format!("{}{}\n", server.uri(), r))
        .collect()
}

fn sources(server: &MockServer) -> (HttpSource, Arc<HttpFetcher>) {
    let client = build_client("fanout-test", None).unwrap();
    let source = HttpSource::new(client.clone(), &format!("{}/sample", server.uri())).unwrap();
    (source, Arc::new(HttpFetcher::new(client)))
}

#[tokio::test]
async fn reads_addresses_line_by_line() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/sample",
        ResponseTemplate::new(200).set_body_string("http://a/1\r\nhttp://b/2\nhttp://c/3"),
    )
    .await;

    let (source, _) = sources(&server);
    let addresses: Vec<_> = source.open().await.unwrap().collect().await;
    assert_eq!(addresses, vec!["http://a/1", "http://b/2", "http://c/3"]);
}

#[tokio::test]
async fn every_status_counts_as_success() {
    let server = MockServer::start().await;
    mount(&server, "/ok", ResponseTemplate::new(200).set_body_string("message: success")).await;
    mount(&server, "/client", ResponseTemplate::new(400).set_body_string("message: client error")).await;
    mount(&server, "/server", ResponseTemplate::new(500).set_body_string("message: server error")).await;
    mount(
        &server,
        "/sample",
        ResponseTemplate::new(200).set_body_string(list_body(&server, &["/ok", "/client", "/server"])),
    )
    .await;

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_secs(5), None);
    let report = engine
        .run(&source, fetcher, output::shared(Box::new(DiscardOutput)))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.successes, 3);
}

#[tokio::test]
async fn transport_failures_do_not_abort_the_batch() {
    let server = MockServer::start().await;
    mount(&server, "/a", ResponseTemplate::new(200).set_body_string("a")).await;
    mount(&server, "/b", ResponseTemplate::new(200).set_body_string("b")).await;
    let list = format!(
        "{}not-a-url\nhttp://127.0.0.1:1/refused\n",
        list_body(&server, &["/a", "/b"])
    );
    mount(&server, "/sample", ResponseTemplate::new(200).set_body_string(list)).await;

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_secs(5), None);
    let report = engine
        .run(&source, fetcher, output::shared(Box::new(DiscardOutput)))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.launched, 4);
    assert_eq!(report.successes, 2);
    assert_eq!(engine.get_metrics().fetches_failed, 2);
}

#[tokio::test]
async fn slow_upstream_times_out_with_partial_count() {
    let server = MockServer::start().await;
    mount(&server, "/a", ResponseTemplate::new(200).set_body_string("a")).await;
    mount(&server, "/b", ResponseTemplate::new(200).set_body_string("b")).await;
    mount(
        &server,
        "/c",
        ResponseTemplate::new(200)
            .set_body_string("c")
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    mount(
        &server,
        "/sample",
        ResponseTemplate::new(200).set_body_string(list_body(&server, &["/a", "/b", "/c"])),
    )
    .await;

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_millis(500), None);
    let report = engine
        .run(&source, fetcher, output::shared(Box::new(DiscardOutput)))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::TimedOut);
    assert_eq!(report.successes, 2);
    assert_eq!(report.launched, 3);
    assert_eq!(engine.status(), BatchStatus::TimedOut);
}

#[tokio::test]
async fn empty_list_completes_without_fetching() {
    let server = MockServer::start().await;
    mount(&server, "/sample", ResponseTemplate::new(200).set_body_string("")).await;

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_millis(1), None);
    let report = engine
        .run(&source, fetcher, output::shared(Box::new(DiscardOutput)))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.successes, 0);
    assert_eq!(report.launched, 0);
}

#[tokio::test]
async fn unreachable_source_is_fatal() {
    let client = build_client("fanout-test", None).unwrap();
    let source = HttpSource::new(client.clone(), "http://127.0.0.1:1/sample").unwrap();
    let engine = FanOutEngine::new(Duration::from_secs(1), None);

    let result = engine
        .run(
            &source,
            Arc::new(HttpFetcher::new(client)),
            output::shared(Box::new(DiscardOutput)),
        )
        .await;

    assert!(matches!(result, Err(Error::Source(_))));
    assert_eq!(engine.get_metrics().addresses_queued, 0);
    assert_eq!(engine.status(), BatchStatus::Idle);
}

#[tokio::test]
async fn bodies_reach_the_output_sink() {
    let server = MockServer::start().await;
    mount(&server, "/one", ResponseTemplate::new(200).set_body_string("message: one")).await;
    mount(&server, "/two", ResponseTemplate::new(200).set_body_string("message: two")).await;
    mount(
        &server,
        "/sample",
        ResponseTemplate::new(200).set_body_string(list_body(&server, &["/one", "/two"])),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("bodies.txt");
    let sink = output::shared(Box::new(FileOutput::new(out_path.clone()).unwrap()));

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_secs(5), None);
    let report = engine.run(&source, fetcher, sink.clone()).await.unwrap();
    sink.lock().await.close().await.unwrap();

    assert_eq!(report.successes, 2);
    let content = std::fs::read_to_string(&out_path).unwrap();
    let mut lines: Vec<_> = content.lines().collect();
    lines.sort();
    assert_eq!(lines, vec!["message: one", "message: two"]);
}

#[tokio::test]
async fn cut_off_list_still_yields_its_last_line() {
    let uri = truncated_server("http://a/1\nhttp://b/2").await;
    let client = build_client("fanout-test", None).unwrap();
    let source = HttpSource::new(client, &format!("{}/sample", uri)).unwrap();

    let addresses: Vec<_> = source.open().await.unwrap().collect().await;
    assert_eq!(addresses, vec!["http://a/1", "http://b/2"]);
}

#[tokio::test]
async fn cut_off_list_is_not_fatal() {
    let server = MockServer::start().await;
    mount(&server, "/a", ResponseTemplate::new(200).set_body_string("a")).await;
    let uri = truncated_server(list_body(&server, &["/a"])).await;

    let client = build_client("fanout-test", None).unwrap();
    let source = HttpSource::new(client.clone(), &format!("{}/sample", uri)).unwrap();
    let engine = FanOutEngine::new(Duration::from_secs(5), None);
    let report = engine
        .run(
            &source,
            Arc::new(HttpFetcher::new(client)),
            output::shared(Box::new(DiscardOutput)),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.launched, 1);
    assert_eq!(report.successes, 1);
}

#[tokio::test]
async fn cut_off_body_is_a_fetch_error() {
    let uri = truncated_server("message: partial").await;
    let fetcher = HttpFetcher::new(build_client("fanout-test", None).unwrap());
    let address = format!("{}/json/abc", uri);

    let result = fetcher.fetch(&address).await;
    match result {
        Err(Error::Fetch { address: failed, .. }) => assert_eq!(failed, address),
        other => panic!("expected a fetch error, got {:?}", other.map(|b| b.status)),
    }
}

#[tokio::test]
async fn cut_off_body_is_excluded_from_the_count() {
    let truncated = truncated_server("message: partial").await;
    let server = MockServer::start().await;
    mount(&server, "/ok", ResponseTemplate::new(200).set_body_string("message: success")).await;
    let list = format!("{}{}/json/abc\n", list_body(&server, &["/ok"]), truncated);
    mount(&server, "/sample", ResponseTemplate::new(200).set_body_string(list)).await;

    let (source, fetcher) = sources(&server);
    let engine = FanOutEngine::new(Duration::from_secs(5), None);
    let report = engine
        .run(&source, fetcher, output::shared(Box::new(DiscardOutput)))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.launched, 2);
    assert_eq!(report.successes, 1);
    assert_eq!(engine.get_metrics().fetches_failed, 1);
}
