use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::application::transport::{
    CallMethod, Credentials, TransportError, UpstreamCall, UpstreamReply, UpstreamTransport,
};

use super::error::InfraError;

/// `reqwest`-backed transport shared by every upstream provider.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn default_user_agent() -> &'static str {
        concat!("wayfarer/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send(&self, call: UpstreamCall) -> Result<UpstreamReply, TransportError> {
        let UpstreamCall {
            method,
            url,
            credentials,
            timeout,
        } = call;

        debug!(target = "wayfarer::upstream", op = "send", host = url.host_str().unwrap_or(""), path = url.path());

        let mut request = match method {
            CallMethod::Get => self.client.get(url),
            CallMethod::PostForm(fields) => self.client.post(url).form(&fields),
        };
        request = match credentials {
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Anonymous => request,
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(err, timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| classify(err, timeout))?;

        Ok(UpstreamReply {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
