//! HTTP [`MetadataSource`] backed by the Rancher metadata service.

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;

use rancher_conf_core::{
    ContainerRecord, HostRecord, MetadataError, MetadataSource, ServiceRecord, StackRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking metadata client for `<metadata-url>/<metadata-version>`.
pub struct HttpMetadataClient {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpMetadataClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base_url: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client and block until `/version` answers.
    ///
    /// Every failed attempt is logged and retried after `retry`.
    pub fn connect_and_wait(endpoint: impl Into<String>, retry: Duration) -> Self {
        let client = Self::new(endpoint);
        loop {
            match client.get_version() {
                Ok(version) => {
                    tracing::info!(url = %client.base_url, %version, "connected to metadata service");
                    return client;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "metadata service not reachable yet, retrying");
                    thread::sleep(retry);
                }
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, url: &str) -> Result<ureq::Response, MetadataError> {
        self.agent
            .get(url)
            .set("Accept", "application/json")
            .call()
            .map_err(|err| MetadataError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let url = self.url(path);
        self.get(&url)?
            .into_json::<T>()
            .map_err(|err| MetadataError::Decode {
                url,
                message: err.to_string(),
            })
    }
}

impl MetadataSource for HttpMetadataClient {
    fn get_version(&self) -> Result<String, MetadataError> {
        let url = self.url("version");
        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| MetadataError::Request {
                url: url.clone(),
                message: err.to_string(),
            })?
            .into_string()
            .map_err(|err| MetadataError::Decode {
                url,
                message: err.to_string(),
            })?;
        Ok(body.trim().trim_matches('"').to_string())
    }

    fn get_stacks(&self) -> Result<Vec<StackRecord>, MetadataError> {
        self.get_json("stacks")
    }

    fn get_hosts(&self) -> Result<Vec<HostRecord>, MetadataError> {
        self.get_json("hosts")
    }

    fn get_services(&self) -> Result<Vec<ServiceRecord>, MetadataError> {
        self.get_json("services")
    }

    fn get_containers(&self) -> Result<Vec<ContainerRecord>, MetadataError> {
        self.get_json("containers")
    }

    fn get_self_container(&self) -> Result<ContainerRecord, MetadataError> {
        self.get_json("self/container")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serve `responses` in order, one connection each, recording request lines.
    fn serve(responses: Vec<&'static str>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for body in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    headers.push(line.trim().to_ascii_lowercase());
                }
                seen.push(format!("{} {}", request_line.trim(), headers.join("|")));
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
                .unwrap();
            }
            seen
        });
        (format!("http://{addr}/2016-07-29"), handle)
    }

    #[test]
    fn version_is_trimmed_plain_text() {
        let (url, server) = serve(vec!["\"4-7f3a\"\n"]);
        let client = HttpMetadataClient::new(url);
        assert_eq!(client.get_version().unwrap(), "4-7f3a");
        let seen = server.join().unwrap();
        assert!(seen[0].starts_with("GET /2016-07-29/version "));
    }

    #[test]
    fn lists_are_decoded_as_json() {
        let (url, server) = serve(vec![
            r#"[{"name":"web","stack_name":"lb","unknown_field":1}]"#,
        ]);
        let client = HttpMetadataClient::new(format!("{url}/"));
        let services = client.get_services().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].key(), "lb.web");
        let seen = server.join().unwrap();
        assert!(seen[0].starts_with("GET /2016-07-29/services "));
        assert!(seen[0].contains("accept: application/json"));
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let (url, server) = serve(vec!["not json"]);
        let err = HttpMetadataClient::new(url).get_hosts().unwrap_err();
        assert!(matches!(err, MetadataError::Decode { .. }), "got: {err}");
        server.join().unwrap();
    }

    #[test]
    fn unreachable_endpoint_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = HttpMetadataClient::new(format!("http://{addr}/latest"))
            .get_version()
            .unwrap_err();
        assert!(matches!(err, MetadataError::Request { .. }), "got: {err}");
    }

    #[test]
    fn connect_and_wait_returns_once_version_answers() {
        let (url, server) = serve(vec!["42"]);
        let client = HttpMetadataClient::connect_and_wait(url.clone(), Duration::from_millis(10));
        assert_eq!(client.base_url(), url);
        server.join().unwrap();
    }
}
