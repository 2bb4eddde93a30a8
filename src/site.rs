use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::GrabError;

pub trait SiteClient: Send + Sync {
    fn fetch_page(&self, url: &Url) -> Result<String, GrabError>;
    fn download_file(&self, url: &Url, destination: &Path) -> Result<(), GrabError>;
}

#[derive(Clone)]
pub struct SiteHttpClient {
    client: Client,
    max_retries: usize,
}

impl SiteHttpClient {
    pub fn new(timeout: Duration, max_retries: usize) -> Result<Self, GrabError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("physiograb/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GrabError::SiteHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GrabError::SiteHttp(err.to_string()))?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), GrabError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "file request failed".to_string());
            return Err(GrabError::SiteStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| GrabError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| GrabError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn send_with_retries(&self, url: &Url) -> Result<reqwest::blocking::Response, GrabError> {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = self.client.get(url.clone()).send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(url = %url, status, attempt, "retrying after status");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(url = %url, attempt, "retrying after transport error");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(GrabError::SiteHttp(err.to_string()));
                }
            }
        }
    }
}

impl SiteClient for SiteHttpClient {
    fn fetch_page(&self, url: &Url) -> Result<String, GrabError> {
        let response = self.send_with_retries(url)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "page request failed".to_string());
            return Err(GrabError::SiteStatus { status, message });
        }
        response
            .text()
            .map_err(|err| GrabError::SiteHttp(err.to_string()))
    }

    fn download_file(&self, url: &Url, destination: &Path) -> Result<(), GrabError> {
        let response = self.send_with_retries(url)?;
        self.write_response_to_file(response, destination)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
