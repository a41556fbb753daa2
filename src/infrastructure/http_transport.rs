//! 基于 reqwest 的网络传输

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use super::transport::{Request, RequestMethod, Response, Transport};
use crate::error::FetchError;

/// HTTP 传输
///
/// 职责：
/// - 持有唯一的 reqwest::Client
/// - 只负责收发，不做缓存、不做重试
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: RequestMethod) -> reqwest::Method {
        match method {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Head => reqwest::Method::HEAD,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        debug!("{} {}", request.method.as_str(), request.url);

        let network_error = |e: reqwest::Error| FetchError::Network {
            url: request.url.to_string(),
            message: e.to_string(),
        };

        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let res = builder
            .send()
            .await
            .map_err(network_error)?;

        let status = res.status().as_u16();
        let url = res.url().clone();
        let headers: BTreeMap<String, String> = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = res.bytes().await.map_err(network_error)?.to_vec();

        debug!("{} -> {} ({} 字节)", request.url, status, body.len());

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
