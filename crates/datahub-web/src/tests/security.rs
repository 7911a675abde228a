use axum::http::{Method, StatusCode};

use super::harness::{TestHarness, anonymous, header_value};

#[tokio::test]
async fn responses_carry_security_headers() {
    let harness = TestHarness::setup();

    for (uri, status) in [("/", StatusCode::OK), ("/missing", StatusCode::NOT_FOUND)] {
        let response = harness.send(anonymous(Method::GET, uri)).await;
        assert_eq!(response.status(), status, "{uri}");
        let headers = response.headers();
        assert_eq!(header_value(headers, "x-content-type-options"), Some("nosniff"));
        assert_eq!(header_value(headers, "x-frame-options"), Some("DENY"));
        assert_eq!(header_value(headers, "referrer-policy"), Some("no-referrer"));
        assert_eq!(header_value(headers, "cache-control"), Some("no-store"));
        let csp = header_value(headers, "content-security-policy").expect("csp header");
        assert!(csp.contains("default-src 'none'"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }
}
