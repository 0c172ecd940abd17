use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::RuntimeSettings;

use super::event::RunEvent;
use super::parser::{FrameParser, Utf8Decoder};

/// 送往代理執行期的單次執行請求。
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub agent_id: String,
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl RunRequest {
    pub fn new(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            message: message.into(),
            session_id: None,
            user_id: None,
        }
    }
}

/// 串流過程中送給消費端的更新。
#[derive(Debug)]
pub enum StreamUpdate {
    /// 解出的一個事件。
    Event(RunEvent),
    /// 傳輸層已結束，緩衝區也已清空。
    Completed,
    /// 傳輸失敗；之後不會再有其他更新。
    Error(String),
}

/// 傳輸層錯誤。解析器本身不會產生錯誤。
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("執行期回應錯誤 ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("無效的 API 金鑰標頭")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// 以 HTTP 串流呼叫代理執行期，並把回應本文交給 [`FrameParser`] 解碼。
#[derive(Clone)]
pub struct RunStreamClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl RunStreamClient {
    /// 根據提供的設定建立客戶端。
    ///
    /// `timeout_secs` 同時作為連線逾時與兩次讀取之間的閒置逾時；
    /// 不設定整體請求逾時，長時間的串流不會被中途切斷。
    pub fn new(settings: &RuntimeSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .context("建立 HTTP 客戶端失敗")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.resolved_api_key(),
            client,
        })
    }

    /// 指定代理的執行端點。
    pub fn runs_url(&self, agent_id: &str) -> String {
        format!("{}/v1/agents/{}/runs", self.base_url, agent_id)
    }

    /// 在背景任務中執行請求，回傳接收更新的 channel。
    ///
    /// 失敗會以單一個 `StreamUpdate::Error` 回報。丟棄接收端即可讓傳輸提早停止。
    pub fn spawn(&self, request: RunRequest) -> UnboundedReceiver<StreamUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(err) = client.run(request, &tx).await {
                warn!("Run stream failed: {err}");
                let _ = tx.send(StreamUpdate::Error(err.to_string()));
            }
        });
        rx
    }

    /// 送出請求並逐段解碼回應本文，直到傳輸結束或接收端被關閉。
    pub async fn run(
        &self,
        request: RunRequest,
        tx: &UnboundedSender<StreamUpdate>,
    ) -> Result<(), StreamError> {
        let url = self.runs_url(&request.agent_id);
        let mut form: Vec<(&str, String)> = vec![
            ("message", request.message),
            ("stream", "true".to_string()),
        ];
        if let Some(session_id) = request.session_id {
            form.push(("session_id", session_id));
        }
        if let Some(user_id) = request.user_id {
            form.push(("user_id", user_id));
        }

        debug!("Starting run stream: {url}");
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::new();
        let mut emitted = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = decoder.decode(&chunk);
            for event in parser.push(&text) {
                if tx.send(StreamUpdate::Event(event)).is_err() {
                    debug!("Run stream receiver dropped after {emitted} events");
                    return Ok(());
                }
                emitted += 1;
            }
        }

        let tail = decoder.finish();
        let mut remaining = parser.push(&tail);
        remaining.extend(parser.finish());
        for event in remaining {
            if tx.send(StreamUpdate::Event(event)).is_err() {
                return Ok(());
            }
            emitted += 1;
        }

        debug!("Run stream completed with {emitted} events");
        let _ = tx.send(StreamUpdate::Completed);
        Ok(())
    }

    fn build_headers(&self) -> Result<HeaderMap, StreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(api_key) = &self.api_key {
            let value = format!("Bearer {}", api_key);
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&value)?);
        }
        Ok(headers)
    }
}

/// 從錯誤回應本文中取出可讀的訊息。
///
/// 優先使用 JSON 的 `detail`、`message` 或 `error` 欄位，其次為原始文字，最後是狀態碼說明。
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            match json.get(key) {
                Some(serde_json::Value::String(text)) => return text.clone(),
                Some(serde_json::Value::Null) | None => continue,
                Some(other) => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
