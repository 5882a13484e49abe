use httpmock::prelude::*;
use lcr_reports::core::aggregator::HistoricalReportAggregator;
use lcr_reports::domain::ports::ConfigProvider;
use lcr_reports::domain::table::AggregatedTable;
use lcr_reports::{EtlEngine, EtlError, LcrClient, LocalStorage, Profile, ReportPipeline};
use tempfile::TempDir;

fn profile_toml(base_url: &str, output_path: &str, extra: &str) -> String {
    format!(
        r#"
[profile]
unit_name = "Oak Hills Stake"
unit_number = 999

[source]
base_url = "{base_url}"

[auth]
method = "cookies"
cookies = {{ appSession = "abc" }}

[units]
inline = [
    {{ name = "Oak Hills", number = 123 }},
    {{ name = "Pine Ridge", number = 456 }},
]

[load]
output_path = "{output_path}"
{extra}
"#
    )
}

fn report_body(members: u32, attendance: u32) -> serde_json::Value {
    serde_json::json!({
        "sections": [{
            "nameResourceId": "attendance",
            "rows": [
                {"nameResourceId": "total.members", "actualValue": members, "potentialValue": 300},
                {"nameResourceId": "sacrament.attendance", "actualValue": attendance, "potentialValue": 250}
            ]
        }]
    })
}

async fn mock_unit(server: &MockServer, unit: &str, quarters: &[&str]) {
    let quarters: Vec<String> = quarters.iter().map(|q| q.to_string()).collect();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/report/quarterly-report/quarters")
                .query_param("unitNumber", unit);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!(quarters));
        })
        .await;
}

async fn mock_report(
    server: &MockServer,
    unit: &str,
    year: &str,
    quarter: &str,
    body: serde_json::Value,
) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/report/quarterly-report")
                .query_param("unitNumber", unit)
                .query_param("year", year)
                .query_param("quarter", quarter);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body);
        })
        .await;
}

async fn run(profile: Profile) -> lcr_reports::Result<String> {
    let authenticator = profile.authenticator()?;
    let units = profile.load_units()?;
    let client = LcrClient::connect(profile.client_settings(), authenticator.as_ref()).await?;
    let aggregator = HistoricalReportAggregator::new(client).with_policy(profile.failure_policy());
    let storage = LocalStorage::new(profile.output_path().to_string());
    let pipeline = ReportPipeline::new(aggregator, units.units().to_vec(), storage, profile);
    EtlEngine::new(pipeline).run().await
}

#[tokio::test]
async fn test_end_to_end_download_writes_csv_and_charts() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start_async().await;

    mock_unit(&server, "123", &["2024-1", "2024-2"]).await;
    mock_unit(&server, "456", &["2024-1"]).await;
    mock_report(&server, "123", "2024", "1", report_body(250, 100)).await;
    mock_report(&server, "123", "2024", "2", report_body(255, 110)).await;
    mock_report(&server, "456", "2024", "1", report_body(180, 90)).await;

    let toml = profile_toml(&server.base_url(), &output_path, "");
    let profile = Profile::from_toml_str(&toml).unwrap();
    let path = run(profile).await.unwrap();
    assert!(path.ends_with("Oak Hills Stake.csv"));

    let csv = std::fs::read_to_string(temp_dir.path().join("Oak Hills Stake.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with(
        "year,quarter.num,quarter,unitId,unitName,total.members,total.members.potential,sacrament.attendance,sacrament.attendance.potential"
    ));
    assert!(lines[1].starts_with("2024,1,2024-Q1,123,Oak Hills,250,300,100,250,0.4"));
    assert!(lines[2].starts_with("2024,2,2024-Q2,123,Oak Hills,255,300,110,250,0.44"));
    assert!(lines[3].starts_with("2024,1,2024-Q1,456,Pine Ridge,180,300,90,250,0.36"));

    let table = AggregatedTable::read_csv(csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.rows()[2].value("sacrament.attendance.pct"), Some(0.36));

    let charts: serde_json::Value = serde_json::from_slice(
        &std::fs::read(temp_dir.path().join("Oak Hills Stake.charts.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(charts["overview"]["title"], "Oak Hills Stake");
    assert_eq!(charts["charts"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_failed_period_aborts_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start_async().await;

    mock_unit(&server, "123", &["2024-1"]).await;
    mock_unit(&server, "456", &["2024-1"]).await;
    mock_report(&server, "123", "2024", "1", report_body(250, 100)).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/report/quarterly-report")
                .query_param("unitNumber", "456");
            then.status(500);
        })
        .await;

    let toml = profile_toml(&server.base_url(), &output_path, "");
    let profile = Profile::from_toml_str(&toml).unwrap();
    let err = run(profile).await.unwrap_err();

    assert!(matches!(err, EtlError::HttpStatusError { status: 500, .. }));
    assert!(!temp_dir.path().join("Oak Hills Stake.csv").exists());
}

#[tokio::test]
async fn test_failed_period_is_skipped_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start_async().await;

    mock_unit(&server, "123", &["2024-1"]).await;
    mock_unit(&server, "456", &["2024-1"]).await;
    mock_report(&server, "123", "2024", "1", report_body(250, 100)).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/report/quarterly-report")
                .query_param("unitNumber", "456");
            then.status(500);
        })
        .await;

    let extra = "charts = false\n\n[error_handling]\non_period_failure = \"skip\"";
    let toml = profile_toml(&server.base_url(), &output_path, extra);
    let profile = Profile::from_toml_str(&toml).unwrap();
    run(profile).await.unwrap();

    let csv = std::fs::read_to_string(temp_dir.path().join("Oak Hills Stake.csv")).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(!csv.contains("Pine Ridge"));
    assert!(!temp_dir.path().join("Oak Hills Stake.charts.json").exists());
}

#[tokio::test]
async fn test_expired_session_aborts_even_when_skipping() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start_async().await;

    mock_unit(&server, "123", &["2024-1"]).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/report/quarterly-report");
            then.status(403);
        })
        .await;

    let extra = "\n[error_handling]\non_period_failure = \"skip\"";
    let toml = profile_toml(&server.base_url(), &output_path, extra);
    let profile = Profile::from_toml_str(&toml).unwrap();
    let err = run(profile).await.unwrap_err();

    assert!(matches!(err, EtlError::AuthenticationError { .. }));
}
