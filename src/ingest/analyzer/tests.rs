use super::*;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server_uri: &str) -> AnalyzerConfig {
    AnalyzerConfig {
        endpoint: server_uri.to_string(),
        api_key: None,
        model_id: "prebuilt-invoice".to_string(),
    }
}

#[test]
fn unconfigured_analyzer_is_rejected() {
    let config = AnalyzerConfig::default();
    assert!(AnalyzerClient::new(&config).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_parses_documents() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(body_json(serde_json::json!({
            "model_id": "prebuilt-invoice",
            "document_url": "https://example.com/invoice.pdf"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "documents": [{
                "doc_type": "invoice",
                "confidence": 0.98,
                "fields": {
                    "total": "42.00",
                    "vendor": null
                }
            }]
        })))
        .mount(&mock_server)
        .await;

    let client = AnalyzerClient::new(&config_for(&mock_server.uri())).unwrap();
    let analysis = tokio::task::spawn_blocking(move || {
        client.analyze("https://example.com/invoice.pdf")
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(analysis.documents.len(), 1);
    let document = &analysis.documents[0];
    assert_eq!(document.doc_type, "invoice");
    assert_eq!(document.fields.get("total"), Some(&Some("42.00".to_string())));
    assert_eq!(document.fields.get("vendor"), Some(&None));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_surfaces_as_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = AnalyzerClient::new(&config_for(&mock_server.uri())).unwrap();
    let result = tokio::task::spawn_blocking(move || {
        client.analyze("https://example.com/invoice.pdf")
    })
    .await
    .unwrap();

    assert!(result.is_err());
}
