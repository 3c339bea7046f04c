use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::models::{CancelResponse, GenerateRequest, StartResponse, TaskStatus};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn start(&self, requirements: &str) -> Result<StartResponse, String> {
        let resp = self
            .client
            .post(self.url("/generate/start"))
            .json(&GenerateRequest {
                requirements: requirements.to_string(),
            })
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn status(&self, task_id: &str) -> Result<TaskStatus, String> {
        let resp = self
            .client
            .get(self.url(&format!("/generate/status/{task_id}")))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn cancel(&self, task_id: &str) -> Result<CancelResponse, String> {
        let resp = self
            .client
            .post(self.url(&format!("/generate/cancel/{task_id}")))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn list_tasks(&self, limit: usize) -> Result<Vec<TaskStatus>, String> {
        let resp = self
            .client
            .get(self.url(&format!("/tasks?limit={limit}")))
            .send()
            .map_err(|err| err.to_string())?;
        let value: serde_json::Value = decode(resp)?;
        let tasks = value
            .get("tasks")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(tasks
            .into_iter()
            .filter_map(|item| serde_json::from_value::<TaskStatus>(item).ok())
            .collect())
    }

    pub fn diagram(&self, diagram_id: &str) -> Result<Vec<u8>, String> {
        let resp = self
            .client
            .get(self.url(&format!("/diagram/{diagram_id}")))
            .send()
            .map_err(|err| err.to_string())?;
        let resp = check(resp)?;
        resp.bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| err.to_string())
    }
}

fn check(resp: Response) -> Result<Response, String> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    Err(format!("http {}: {}", status.as_u16(), body))
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    check(resp)?.json::<T>().map_err(|err| err.to_string())
}
