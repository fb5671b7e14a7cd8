use std::sync::Arc;
use std::time::Duration;

use rswig::http::error_fingerprint;
use rswig::{
    Category, ConfigBuilder, ExpectedCode, Fingerprint, FingerprintGroup, MatchRule, Requester, ResponseCache,
    RunMode, WigError,
};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fingerprint(url: &str, code: ExpectedCode) -> Arc<Fingerprint> {
    Arc::new(Fingerprint {
        name: "WordPress".to_string(),
        category: Category::Cms,
        url: Some(url.to_string()),
        rule: MatchRule::String("WordPress".to_string()),
        output: None,
        code,
        weight: 1.0,
        note: None,
        show_all_detections: true,
    })
}

fn requester(uri: &str) -> (Requester, Arc<ResponseCache>) {
    let config = ConfigBuilder::new()
        .url(uri)
        .threads(4)
        .timeout(Duration::from_secs(5))
        .build();
    let cache = Arc::new(ResponseCache::new());
    let requester = Requester::new(&config, cache.clone(), CancellationToken::new()).unwrap();
    (requester, cache)
}

#[tokio::test]
async fn test_head_then_get_and_cache_reuse() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/readme.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/readme.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>WordPress</h1>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (requester, cache) = requester(&mock_server.uri());
    let group = FingerprintGroup::new("/readme.html", vec![fingerprint("/readme.html", ExpectedCode::Ok)]);

    let first = requester.run(vec![group.clone()], RunMode::Fingerprint).await;
    let response = first[0].response.clone().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "<h1>WordPress</h1>");

    let second = requester.run(vec![group], RunMode::Fingerprint).await;
    assert_eq!(second[0].response.as_ref().unwrap().id, response.id);
    assert_eq!(requester.request_count(), 2);
    assert!(cache.contains(&format!("{}/readme.html", mock_server.uri())));
}

#[tokio::test]
async fn test_head_not_found_skips_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/wp-login.php"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-login.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (requester, cache) = requester(&mock_server.uri());
    let group = FingerprintGroup::new("/wp-login.php", vec![fingerprint("/wp-login.php", ExpectedCode::Ok)]);

    let out = requester.run(vec![group], RunMode::Fingerprint).await;
    assert!(out[0].response.is_none());
    // HEAD 的结果同样进入缓存
    let cached = cache.get(&format!("{}/wp-login.php", mock_server.uri())).unwrap();
    assert_eq!(cached.status, 404);
}

#[tokio::test]
async fn test_non_default_code_goes_straight_to_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(500).set_body_string("WordPress database error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (requester, _) = requester(&mock_server.uri());
    let group = FingerprintGroup::new(
        "/error",
        vec![
            fingerprint("/error", ExpectedCode::Ok),
            fingerprint("/error", ExpectedCode::Any),
        ],
    );

    let out = requester.run(vec![group], RunMode::Fingerprint).await;
    assert_eq!(out[0].response.as_ref().unwrap().status, 500);
}

#[tokio::test]
async fn test_redirect_out_of_scope_is_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "http://evil.example/phish"))
        .mount(&mock_server)
        .await;

    let (requester, cache) = requester(&mock_server.uri());
    let out = requester
        .run(vec![FingerprintGroup::bare("/login")], RunMode::Fingerprint)
        .await;

    assert!(out[0].response.is_none());
    assert!(!cache.contains("http://evil.example/phish"));
    assert!(!cache.contains(&format!("{}/login", mock_server.uri())));
    assert!(cache.responses().iter().all(|r| !r.url.contains("evil.example")));
}

#[tokio::test]
async fn test_absolute_url_out_of_scope_is_skipped() {
    let mock_server = MockServer::start().await;
    let (requester, cache) = requester(&mock_server.uri());

    let out = requester
        .run(vec![FingerprintGroup::bare("http://evil.example/app.js")], RunMode::Crawl)
        .await;

    assert!(out[0].response.is_none());
    assert_eq!(requester.request_count(), 0);
    assert_eq!(cache.num_unique(), 0);
}

#[tokio::test]
async fn test_redirect_in_scope_aliases_every_hop() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .mount(&mock_server)
        .await;

    let (requester, cache) = requester(&mock_server.uri());
    let out = requester
        .run(vec![FingerprintGroup::bare("/old")], RunMode::Crawl)
        .await;

    let response = out[0].response.clone().unwrap();
    assert_eq!(response.body, "fresh");
    assert!(response.url.ends_with("/new"));
    assert_eq!(response.history.len(), 1);
    assert_eq!(response.history[0].status, 301);
    assert!(response.crawled);

    let old = cache.get(&format!("{}/old", mock_server.uri())).unwrap();
    let new = cache.get(&format!("{}/new", mock_server.uri())).unwrap();
    assert_eq!(old.id, new.id);
    assert_eq!(cache.num_unique(), 1);
}

#[tokio::test]
async fn test_detect_redirect_to_other_origin() {
    let target = MockServer::start().await;
    let destination = MockServer::start().await;

    Mock::given(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/", destination.uri()).as_str()))
        .mount(&target)
        .await;
    Mock::given(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home"))
        .mount(&destination)
        .await;

    let (requester, cache) = requester(&target.uri());
    let probe = requester.detect_redirect().await.unwrap();

    assert!(probe.redirected);
    assert_eq!(probe.location.as_str(), format!("{}/", destination.uri()));
    assert_eq!(cache.get(probe.location.as_str()).unwrap().body, "home");
    assert!(cache.contains(&format!("{}/", target.uri())));
}

#[tokio::test]
async fn test_detect_redirect_same_origin() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home"))
        .mount(&mock_server)
        .await;

    let (requester, _) = requester(&mock_server.uri());
    let probe = requester.detect_redirect().await.unwrap();
    assert!(!probe.redirected);
}

#[tokio::test]
async fn test_detect_redirect_does_not_alias_site_root() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/app/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>App</title>"))
        .mount(&mock_server)
        .await;
    Mock::given(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Root</title>"))
        .mount(&mock_server)
        .await;

    let (requester, cache) = requester(&format!("{}/app/", mock_server.uri()));
    let probe = requester.detect_redirect().await.unwrap();

    assert!(!probe.redirected);
    assert_eq!(probe.location.as_str(), format!("{}/", mock_server.uri()));
    assert_eq!(cache.get(&format!("{}/app/", mock_server.uri())).unwrap().body, "<title>App</title>");
    assert!(!cache.contains(&format!("{}/", mock_server.uri())));

    // 站点根目录需单独请求，得到的是根页面本身
    let out = requester
        .run(vec![FingerprintGroup::bare("/")], RunMode::Fingerprint)
        .await;
    assert_eq!(out[0].response.as_ref().unwrap().body, "<title>Root</title>");
}

#[tokio::test]
async fn test_unresolvable_host_is_fatal() {
    let config = ConfigBuilder::new()
        .url("http://rswig-does-not-exist.invalid")
        .timeout(Duration::from_secs(3))
        .build();
    let requester = Requester::new(&config, Arc::new(ResponseCache::new()), CancellationToken::new()).unwrap();

    let err = requester.detect_redirect().await.unwrap_err();
    assert!(matches!(err, WigError::UnresolvableHost(_)));
    assert!(err.is_fatal_for_target());
}

#[tokio::test]
async fn test_harvest_error_hashes() {
    let mock_server = MockServer::start().await;
    let body = "<html><body>Page not found. Request id 20240115 at 10:11:12</body></html>";

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let (requester, _) = requester(&mock_server.uri());
    let hashes = requester
        .harvest_error_hashes(&["/rswig-404-a".to_string(), "/rswig-404-b".to_string()])
        .await;

    assert!(hashes.contains(&error_fingerprint(body.as_bytes())));
    assert_eq!(hashes.len(), 2);
}

#[tokio::test]
async fn test_cancelled_requester_does_not_fetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = ConfigBuilder::new().url(&mock_server.uri()).build();
    let cancel = CancellationToken::new();
    let requester = Requester::new(&config, Arc::new(ResponseCache::new()), cancel.clone()).unwrap();
    cancel.cancel();

    let out = requester
        .run(vec![FingerprintGroup::bare("/a"), FingerprintGroup::bare("/b")], RunMode::Fingerprint)
        .await;
    assert!(out.iter().all(|r| r.response.is_none()));
    assert_eq!(requester.request_count(), 0);
}
