// src/bigquery.rs
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::http::ApiClient;
use crate::lenient::{de_null_default, de_opt_number, de_opt_string};
use crate::warehouse::{FieldSchema, JsonRow, SinkError, TableRef, WarehouseSink};

pub const BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/";
const MULTIPART_BOUNDARY: &str = "kintai_sync_load_boundary";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// --- Load Job Resources ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobReference<'a> {
    project_id: &'a str,
    job_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DestinationTable<'a> {
    project_id: &'a str,
    dataset_id: &'a str,
    table_id: &'a str,
}

#[derive(Debug, Serialize)]
struct TableSchema<'a> {
    fields: &'a [FieldSchema],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration<'a> {
    destination_table: DestinationTable<'a>,
    source_format: &'static str,
    write_disposition: &'static str,
    create_disposition: &'static str,
    schema: TableSchema<'a>,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    load: LoadConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadJob<'a> {
    job_reference: JobReference<'a>,
    configuration: JobConfiguration<'a>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorProto {
    #[serde(default, deserialize_with = "de_opt_string")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default, deserialize_with = "de_opt_string")]
    state: Option<String>,
    #[serde(default)]
    error_result: Option<ErrorProto>,
    #[serde(default, deserialize_with = "de_null_default")]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    // int64 values arrive as JSON strings.
    #[serde(default, deserialize_with = "de_opt_number")]
    output_rows: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Default, Deserialize)]
struct JobResource {
    #[serde(default, deserialize_with = "de_null_default")]
    status: JobStatus,
    #[serde(default, deserialize_with = "de_null_default")]
    statistics: JobStatistics,
}

impl JobResource {
    fn is_done(&self) -> bool {
        self.status.state.as_deref() == Some("DONE")
    }

    fn output_rows(&self) -> u64 {
        self.statistics
            .load
            .as_ref()
            .and_then(|l| l.output_rows)
            .map(|n| n as u64)
            .unwrap_or(0)
    }

    fn failure_message(&self) -> Option<String> {
        let error = self.status.error_result.as_ref()?;
        let mut message = format!(
            "{}: {}",
            error.reason.as_deref().unwrap_or("error"),
            error.message.as_deref().unwrap_or("no message")
        );
        for detail in self.status.errors.iter().filter_map(|e| e.message.as_deref()) {
            message.push_str("; ");
            message.push_str(detail);
        }
        Some(message)
    }
}

// --- Sink ---

/// Loads rows with a BigQuery load job (`WRITE_TRUNCATE`), so the table is
/// swapped in one step when the job succeeds.
#[derive(Debug, Clone)]
pub struct BigQuerySink {
    api: ApiClient,
    base_url: Url,
    location: Option<String>,
    poll_interval: Duration,
}

impl BigQuerySink {
    pub fn new(
        access_token: &str,
        location: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        Self::with_base_url(Url::parse(BIGQUERY_API_BASE)?, access_token, location, timeout)
    }

    pub fn with_base_url(
        base_url: Url,
        access_token: &str,
        location: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        Ok(Self {
            api: ApiClient::new("BigQuery", access_token, timeout)?,
            base_url,
            location: location.filter(|l| !l.trim().is_empty()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn new_job_id(table: &TableRef) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        format!("kintai_sync_{}_{}", table.table, suffix)
    }

    fn multipart_body(job: &LoadJob<'_>, rows: &[JsonRow]) -> Result<String, SinkError> {
        let mut ndjson = String::new();
        for row in rows {
            ndjson.push_str(&serde_json::to_string(row)?);
            ndjson.push('\n');
        }
        Ok(format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{job}\r\n\
             --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
            b = MULTIPART_BOUNDARY,
            job = serde_json::to_string(job)?,
            data = ndjson,
        ))
    }

    async fn insert_job(
        &self,
        table: &TableRef,
        job_id: &str,
        schema: &[FieldSchema],
        rows: &[JsonRow],
    ) -> Result<JobResource, SinkError> {
        let job = LoadJob {
            job_reference: JobReference {
                project_id: &table.project,
                job_id,
                location: self.location.as_deref(),
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    destination_table: DestinationTable {
                        project_id: &table.project,
                        dataset_id: &table.dataset,
                        table_id: &table.table,
                    },
                    source_format: "NEWLINE_DELIMITED_JSON",
                    write_disposition: "WRITE_TRUNCATE",
                    create_disposition: "CREATE_IF_NEEDED",
                    schema: TableSchema { fields: schema },
                },
            },
        };
        let body = Self::multipart_body(&job, rows)?;

        let mut url = self.base_url.join(&format!(
            "upload/bigquery/v2/projects/{}/jobs",
            table.project
        ))?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");

        let request = self
            .api
            .request(Method::POST, url)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body);
        let response = self
            .api
            .send_and_deserialize::<JobResource>(request, "Insert BigQuery Load Job")
            .await?;
        Ok(response.data)
    }

    async fn get_job(&self, project: &str, job_id: &str) -> Result<JobResource, SinkError> {
        let mut url = self
            .base_url
            .join(&format!("bigquery/v2/projects/{}/jobs/{}", project, job_id))?;
        if let Some(location) = &self.location {
            url.query_pairs_mut().append_pair("location", location);
        }
        let response = self
            .api
            .get::<JobResource>(url, "Get BigQuery Job")
            .await?;
        Ok(response.data)
    }
}

#[async_trait]
impl WarehouseSink for BigQuerySink {
    async fn replace_table(
        &self,
        table: &TableRef,
        schema: &[FieldSchema],
        rows: Vec<JsonRow>,
    ) -> Result<u64, SinkError> {
        let job_id = Self::new_job_id(table);
        info!("Starting BigQuery load job {} for {}...", job_id, table);
        let mut job = self.insert_job(table, &job_id, schema, &rows).await?;

        while !job.is_done() {
            debug!(
                "Job {} state {:?}; polling again in {:?}",
                job_id, job.status.state, self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;
            job = self.get_job(&table.project, &job_id).await?;
        }

        if let Some(message) = job.failure_message() {
            return Err(SinkError::JobFailed { job_id, message });
        }
        Ok(job.output_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ClientError;
    use crate::warehouse::FieldType;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(server: &MockServer) -> BigQuerySink {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        BigQuerySink::with_base_url(base, "gcp-token", Some("asia-northeast1".into()), Duration::from_secs(5))
            .unwrap()
            .with_poll_interval(Duration::from_millis(1))
    }

    fn rows() -> Vec<JsonRow> {
        let row = json!({"emp_code": "1001", "late": 5});
        vec![row.as_object().unwrap().clone()]
    }

    fn schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::required("emp_code", FieldType::String),
            FieldSchema::nullable("late", FieldType::Integer),
        ]
    }

    #[test]
    fn failure_message_includes_details() {
        let job: JobResource = serde_json::from_value(json!({
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "Error while reading data"},
                "errors": [{"message": "row 1: no such field late_count"}]
            }
        }))
        .unwrap();
        assert_eq!(
            job.failure_message().unwrap(),
            "invalid: Error while reading data; row 1: no such field late_count"
        );
    }

    #[tokio::test]
    async fn load_job_is_inserted_and_polled_until_done() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .and(query_param("uploadType", "multipart"))
            .and(header("authorization", "Bearer gcp-token"))
            .and(body_string_contains("\"writeDisposition\":\"WRITE_TRUNCATE\""))
            .and(body_string_contains("\"tableId\":\"kot_monthly_summary\""))
            .and(body_string_contains("{\"emp_code\":\"1001\",\"late\":5}"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": {"state": "RUNNING"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/bigquery/v2/projects/proj/jobs/kintai_sync_kot_monthly_summary_\w+$"))
            .and(query_param("location", "asia-northeast1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"state": "DONE"},
                "statistics": {"load": {"outputRows": "1"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = TableRef::new("proj", "ds", "kot_monthly_summary");
        let written = sink(&server)
            .replace_table(&table, &schema(), rows())
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn job_error_result_fails_the_load() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"state": "DONE", "errorResult": {"reason": "invalid", "message": "bad schema"}}
            })))
            .mount(&server)
            .await;

        let table = TableRef::new("proj", "ds", "smarthr_employees");
        match sink(&server).replace_table(&table, &schema(), rows()).await {
            Err(SinkError::JobFailed { job_id, message }) => {
                assert!(job_id.starts_with("kintai_sync_smarthr_employees_"));
                assert_eq!(message, "invalid: bad schema");
            }
            other => panic!("Expected JobFailed but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_error_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Access Denied: dataset ds"))
            .mount(&server)
            .await;

        let table = TableRef::new("proj", "ds", "t");
        match sink(&server).replace_table(&table, &schema(), rows()).await {
            Err(SinkError::Client(ClientError::ApiError { status, body, .. })) => {
                assert_eq!(status.as_u16(), 403);
                assert!(body.contains("Access Denied"));
            }
            other => panic!("Expected ApiError but got: {:?}", other),
        }
    }
}
