//! Execution of `HttpRequest` values.
//!
//! `Transport` is the only place a `Connection` performs I/O. The default
//! `UreqTransport` is a blocking agent that hands every status code back as
//! data so the Streak error marker can be read from 4xx bodies too.

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one request and returns the server's response.
///
/// Implementations report only transport-level failures as `Err`; any
/// response the server produced, whatever its status, is `Ok`.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

#[cfg(feature = "ureq")]
pub use self::blocking::UreqTransport;

#[cfg(feature = "ureq")]
mod blocking {
    use super::Transport;
    use crate::error::{Result, StreakError};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// Blocking transport backed by a `ureq` agent.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
    }

    impl std::fmt::Debug for UreqTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("UreqTransport").finish_non_exhaustive()
        }
    }

    impl UreqTransport {
        pub fn new() -> Self {
            let agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent();
            Self { agent }
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    fn with_headers<B>(
        mut builder: ureq::RequestBuilder<B>,
        headers: &[(String, String)],
    ) -> ureq::RequestBuilder<B> {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    impl Transport for UreqTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            let HttpRequest {
                method,
                url,
                headers,
                body,
            } = request;
            let payload = body.unwrap_or_default();

            let result = match method {
                HttpMethod::Get => with_headers(self.agent.get(&url), &headers).call(),
                HttpMethod::Delete => with_headers(self.agent.delete(&url), &headers).call(),
                HttpMethod::Post => {
                    with_headers(self.agent.post(&url), &headers).send(payload.as_bytes())
                }
                HttpMethod::Put => {
                    with_headers(self.agent.put(&url), &headers).send(payload.as_bytes())
                }
            };
            let mut response = result.map_err(|e| StreakError::Transport(e.to_string()))?;

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
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| StreakError::Transport(e.to_string()))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
