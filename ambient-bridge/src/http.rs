/*!
 * HTTP INGESTION - entrypoint for the weather station "custom server" upload
 *
 * ROLE:
 * The station pushes every reading as query parameters on `/`,
 * `/data/report` or `/data/report/` (GET or POST, body ignored).
 *
 * CONTRACT:
 * - Always 200 + `{"status":"accepted","num_values":N}` once the query parses
 * - N = number of distinct keys
 * - Downstream failures only show up in the logs: the station cannot retry
 *   and may stop reporting if it sees errors
 */

use crate::ingest::{process_report, StationReport};
use crate::mqtt::BusPublisher;
use crate::state::Shared;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, Uri};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ReportAccepted {
    pub status: &'static str,
    pub num_values: usize,
}

pub fn build_router<P: BusPublisher>(ctx: Shared<P>) -> Router {
    Router::new()
        .route("/", get(ingest_report::<P>).post(ingest_report::<P>))
        .route("/data/report", get(ingest_report::<P>).post(ingest_report::<P>))
        .route("/data/report/", get(ingest_report::<P>).post(ingest_report::<P>))
        .with_state(ctx)
}

async fn ingest_report<P: BusPublisher>(
    State(ctx): State<Shared<P>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<ReportAccepted> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!("Request: {method} {} user-agent={user_agent}", uri.path());

    let report = StationReport::from_pairs(pairs);
    let summary = process_report(&ctx, &report).await;
    info!(
        "report done: raw={}/{} discovery={} (failed publishes {}) unknown={} stored={}{}",
        summary.raw_published,
        report.len(),
        summary.discovery_documents,
        summary.discovery_failed,
        summary.unknown_keys.len(),
        summary.stored_fields,
        if summary.store_failed { " (store failed)" } else { "" },
    );

    Json(ReportAccepted {
        status: "accepted",
        num_values: report.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_context;
    use ambient_devkit::{MockInfluxServer, MockMqttClient, StationReportBuilder};
    use axum::http::StatusCode;
    use serde_json::Value;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn serve(ctx: Shared<MockMqttClient>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(ctx);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_report_is_accepted_on_every_path() {
        let ctx = test_context(false, None).shared();
        let addr = serve(ctx.clone()).await;
        let http = reqwest::Client::new();

        for path in ["/", "/data/report", "/data/report/"] {
            let resp = http
                .get(format!("http://{addr}{path}"))
                .query(&[("tempf", "63.1"), ("humidity", "35")])
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body, serde_json::json!({"status": "accepted", "num_values": 2}));
        }

        let resp = http
            .post(format!("http://{addr}/data/report/"))
            .query(&[("uv", "6")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(ctx.publisher.find_messages_by_topic("weather/backyard/tempf").len(), 3);
        assert_eq!(ctx.publisher.find_messages_by_topic("weather/backyard/uv").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query() {
        let ctx = test_context(true, None).shared();
        let addr = serve(ctx.clone()).await;

        let body: Value = reqwest::get(format!("http://{addr}/data/report/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body, serde_json::json!({"status": "accepted", "num_values": 0}));
        assert!(ctx.publisher.get_published_messages().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keys_count_once() {
        let ctx = test_context(false, None).shared();
        let addr = serve(ctx.clone()).await;

        let body: Value = reqwest::get(format!("http://{addr}/?tempf=63.1&tempf=70.0&uv=6"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["num_values"], 2);
        let tempf = ctx.publisher.find_messages_by_topic("weather/backyard/tempf");
        assert_eq!(tempf.len(), 1);
        assert_eq!(tempf[0].payload, b"63.1");
    }

    #[tokio::test]
    async fn test_downstream_failures_still_return_200() {
        let influx = MockInfluxServer::start().await.unwrap();
        influx.fail_with(500);
        let ctx = test_context(true, Some(&influx)).shared();
        ctx.publisher.fail_topic("weather/backyard/tempf");
        let addr = serve(ctx.clone()).await;

        let report = StationReportBuilder::ws2902a("AA:BB:CC:DD:EE:FF")
            .field("humidity", "not-a-number")
            .build();
        let resp = reqwest::Client::new()
            .get(format!("http://{addr}/data/report/"))
            .query(&report)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["num_values"], report.len());
        assert_eq!(influx.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_url_encoded_values_are_decoded() {
        let ctx = test_context(false, None).shared();
        let addr = serve(ctx.clone()).await;

        reqwest::get(format!("http://{addr}/data/report/?PASSKEY=AA%3ABB%3ACC&dateutc=2022-05-01+17%3A20%3A36"))
            .await
            .unwrap();

        assert_eq!(ctx.publisher.find_messages_by_topic("weather/backyard/PASSKEY")[0].payload, b"AA:BB:CC");
        assert_eq!(
            ctx.publisher.find_messages_by_topic("weather/backyard/dateutc")[0].payload,
            b"2022-05-01 17:20:36"
        );
    }
}
