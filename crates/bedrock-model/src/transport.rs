#[cfg(test)]
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mime::Mime;
use reqwest::{Client, StatusCode, Url, header};
use strandline_model::ErrorKind;

use crate::Error;

/// Where invocation bodies are posted.
#[derive(Clone)]
pub enum Transport {
    Http(Client),
    /// Answers every request with a fixed status and body, recording the
    /// request bodies it receives.
    #[cfg(test)]
    Canned {
        status: u16,
        response: Bytes,
        sent: Arc<Mutex<Vec<Bytes>>>,
    },
}

impl Transport {
    #[inline]
    pub fn http() -> Self {
        Transport::Http(Client::new())
    }

    #[cfg(test)]
    pub fn canned(status: u16, response: &'static str) -> Self {
        Transport::Canned {
            status,
            response: Bytes::from_static(response.as_bytes()),
            sent: Default::default(),
        }
    }

    #[cfg(test)]
    pub fn sent_bodies(&self) -> Vec<Bytes> {
        match self {
            Transport::Canned { sent, .. } => sent.lock().unwrap().clone(),
            Transport::Http(_) => vec![],
        }
    }

    /// Posts a JSON body and returns the body of a successful response.
    pub async fn post_json(
        self,
        url: Url,
        api_key: Option<String>,
        body: Bytes,
    ) -> Result<Bytes, Error> {
        match self {
            Transport::Http(client) => {
                let mut req = client
                    .post(url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "application/json");
                if let Some(api_key) = api_key {
                    req = req.header(
                        header::AUTHORIZATION,
                        format!("Bearer {api_key}"),
                    );
                }
                let resp = req.body(body).send().await.map_err(map_reqwest_error)?;

                let status = resp.status();
                let content_type = resp
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(ToOwned::to_owned);
                let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
                check_status(status, &bytes)?;

                let is_json = content_type
                    .as_deref()
                    .and_then(|v| v.parse::<Mime>().ok())
                    .map(|m| m.subtype() == mime::JSON)
                    // Some gateways omit the header, let the parser decide.
                    .unwrap_or(true);
                if !is_json {
                    return Err(Error::new(
                        format!("unexpected content type: {content_type:?}"),
                        ErrorKind::MalformedResponse,
                    ));
                }
                Ok(bytes)
            }
            #[cfg(test)]
            Transport::Canned {
                status,
                response,
                sent,
            } => {
                trace!("canned transport got a request for {url}");
                sent.lock().unwrap().push(body);
                let status = StatusCode::from_u16(status).unwrap();
                check_status(status, &response)?;
                Ok(response)
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    let kind = if err.is_connect() || err.is_timeout() {
        ErrorKind::Network
    } else {
        ErrorKind::Other
    };
    Error::new(format!("{err}"), kind)
}

fn check_status(status: StatusCode, body: &[u8]) -> Result<(), Error> {
    if status.is_success() {
        return Ok(());
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        _ => ErrorKind::Other,
    };
    // Bedrock reports failures as `{"message": "..."}`.
    let detail = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned());
    Err(Error::new(format!("HTTP {status}: {detail}"), kind))
}
