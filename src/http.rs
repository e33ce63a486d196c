use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};

enum Failure {
    Retryable(String),
    Fatal(String),
}

fn classify(err: ureq::Error) -> Failure {
    match err {
        ureq::Error::Status(status, response) => {
            let reason = describe_status(status, response);
            if status == 408 || status == 429 || (500..=599).contains(&status) {
                Failure::Retryable(reason)
            } else {
                Failure::Fatal(reason)
            }
        }
        ureq::Error::Transport(err) => Failure::Retryable(format!("transport error: {err}")),
    }
}

fn describe_status(status: u16, response: ureq::Response) -> String {
    let response_body = response.into_string().ok().unwrap_or_default();
    let body = response_body.trim();
    if body.is_empty() {
        format!("HTTP status {status}")
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!("HTTP status {status} ({truncated})")
    }
}

/// Small JSON-over-HTTP client for a backend-as-a-service REST endpoint.
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
    attempts: usize,
    retry_delay: Duration,
}

impl RestClient {
    pub(crate) fn new(
        base_url: &str,
        api_key: Option<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            attempts: 3,
            retry_delay: Duration::from_millis(250),
        }
    }

    pub(crate) fn with_retries(mut self, attempts: usize, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, mut request: ureq::Request) -> ureq::Request {
        if let Some(key) = &self.api_key {
            request = request
                .set("apikey", key)
                .set("Authorization", &format!("Bearer {key}"));
        }
        request
    }

    /// GET with retries on transport errors and retryable statuses.
    pub(crate) fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = self.url(path);
        let mut last_failure = String::new();
        for attempt in 1..=self.attempts {
            let mut request = self.authorize(self.agent.get(&url));
            for (key, value) in query {
                request = request.query(key, value);
            }

            let failure = match request.call() {
                Ok(response) => {
                    return response
                        .into_string()
                        .with_context(|| format!("GET {path}: unreadable response body"));
                }
                Err(err) => classify(err),
            };
            match failure {
                Failure::Fatal(reason) => bail!("GET {path} failed: {reason}"),
                Failure::Retryable(reason) => {
                    tracing::debug!(%url, attempt, %reason, "request failed");
                    last_failure = reason;
                    if attempt < self.attempts {
                        thread::sleep(self.retry_delay);
                    }
                }
            }
        }
        bail!(
            "GET {path} failed after {} attempt(s): {last_failure}",
            self.attempts
        )
    }

    /// Single-attempt JSON upsert. Writes are never retried: a newer write
    /// supersedes a lost one.
    pub(crate) fn upsert_json(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let request = self
            .authorize(self.agent.post(&self.url(path)))
            .set("Content-Type", "application/json")
            .set("Prefer", "resolution=merge-duplicates");
        match request.send_string(&body.to_string()) {
            Ok(_) => Ok(()),
            Err(err) => match classify(err) {
                Failure::Retryable(reason) | Failure::Fatal(reason) => {
                    bail!("POST {path} failed: {reason}")
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod canned {
    //! In-process HTTP server answering with canned responses.

    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) struct Request {
        pub(crate) head: String,
        pub(crate) body: String,
    }

    /// Records requests in the order their responses were sent.
    pub(crate) struct CannedServer {
        base_url: String,
        requests: Arc<Mutex<Vec<Request>>>,
    }

    impl CannedServer {
        /// Answers one connection per response, one connection at a time.
        pub(crate) fn spawn(responses: Vec<(u16, &'static str)>) -> Self {
            let (listener, base_url) = bind();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = Arc::clone(&requests);
            thread::spawn(move || {
                for (status, body) in responses {
                    let Ok((stream, _)) = listener.accept() else {
                        return;
                    };
                    respond(stream, &recorded, status, body, |_| Duration::ZERO);
                }
            });
            Self { base_url, requests }
        }

        /// Answers every connection on its own thread with `status`, holding
        /// each response back for `latency(body)`.
        pub(crate) fn spawn_concurrent(status: u16, latency: fn(&str) -> Duration) -> Self {
            let (listener, base_url) = bind();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = Arc::clone(&requests);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else {
                        return;
                    };
                    let recorded = Arc::clone(&recorded);
                    thread::spawn(move || respond(stream, &recorded, status, "", latency));
                }
            });
            Self { base_url, requests }
        }

        pub(crate) fn base_url(&self) -> &str {
            &self.base_url
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.requests.lock().expect("lock requests").clone()
        }

        pub(crate) fn heads(&self) -> Vec<String> {
            self.requests().into_iter().map(|request| request.head).collect()
        }
    }

    fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind canned server");
        let addr = listener.local_addr().expect("local addr");
        (listener, format!("http://{addr}"))
    }

    fn respond(
        stream: TcpStream,
        recorded: &Mutex<Vec<Request>>,
        status: u16,
        body: &str,
        latency: fn(&str) -> Duration,
    ) {
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 && line != "\r\n" {
            head.push_str(&line);
            line.clear();
        }
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let mut request_body = vec![0; body_len];
        let _ = reader.read_exact(&mut request_body);
        let request_body = String::from_utf8_lossy(&request_body).into_owned();

        thread::sleep(latency(&request_body));
        recorded.lock().expect("lock requests").push(Request {
            head,
            body: request_body,
        });
        let mut stream = reader.into_inner();
        let _ = write!(
            stream,
            "HTTP/1.1 {status} Canned\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::canned::CannedServer;
    use super::*;

    fn client(server: &CannedServer) -> RestClient {
        RestClient::new(
            server.base_url(),
            Some("secret".to_string()),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .with_retries(3, Duration::from_millis(1))
    }

    #[test]
    fn get_retries_retryable_statuses_until_success() {
        let server = CannedServer::spawn(vec![(500, "boom"), (429, "slow down"), (200, "ok")]);
        let body = client(&server)
            .get_text("titles", &[("id", "eq.x")])
            .expect("should eventually succeed");
        assert_eq!(body, "ok");

        let heads = server.heads();
        assert_eq!(heads.len(), 3);
        assert!(heads[2].starts_with("GET /titles?id=eq.x"), "unexpected: {}", heads[2]);
    }

    #[test]
    fn get_does_not_retry_client_errors() {
        let server = CannedServer::spawn(vec![(404, "not-found"), (200, "late")]);
        let err = client(&server)
            .get_text("titles", &[])
            .expect_err("404 should not be retried");
        assert!(err.to_string().contains("HTTP status 404"), "unexpected: {err}");
        assert_eq!(server.heads().len(), 1);
    }

    #[test]
    fn get_gives_up_after_configured_attempts() {
        let server = CannedServer::spawn(vec![(503, "down"), (503, "down"), (503, "down")]);
        let err = client(&server)
            .get_text("watch_progress", &[])
            .expect_err("every attempt fails");
        assert!(err.to_string().contains("after 3 attempt(s)"), "unexpected: {err}");
    }

    #[test]
    fn upsert_is_sent_once_with_auth_and_merge_headers() {
        let server = CannedServer::spawn(vec![(503, "down"), (201, "")]);
        let result = client(&server)
            .upsert_json("watch_progress", &serde_json::json!({"title_id": "x"}));
        assert!(result.is_err());

        let heads = server.heads();
        assert_eq!(heads.len(), 1);
        let head = heads[0].to_lowercase();
        assert!(head.starts_with("post /watch_progress"), "unexpected: {head}");
        assert!(head.contains("authorization: bearer secret"));
        assert!(head.contains("apikey: secret"));
        assert!(head.contains("prefer: resolution=merge-duplicates"));
    }
}
