//! Job Centre wire protocol: one JSON object per line, in both directions.

use serde::Deserialize;
use serde_json::{json, Value};

/// A decoded client request. Anything that doesn't parse into one of these
/// shapes is reported back as [`Response::Error`] rather than failing the
/// connection — the protocol treats malformed requests as recoverable.
#[derive(Debug, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum Request {
    Put {
        queue: String,
        job: Value,
        pri: i64,
    },
    Get {
        queues: Vec<String>,
        #[serde(default)]
        wait: bool,
    },
    Delete {
        id: u64,
    },
    Abort {
        id: u64,
    },
}

/// A server response, one JSON object per line.
#[derive(Debug)]
pub enum Response {
    PutOk { id: u64 },
    GetOk { id: u64, job: Value, pri: i64, queue: String },
    Ok,
    NoJob,
    Error,
}

impl Response {
    pub fn to_json(&self) -> Value {
        match self {
            Response::PutOk { id } => json!({"status": "ok", "id": id}),
            Response::GetOk { id, job, pri, queue } => {
                json!({"status": "ok", "id": id, "job": job, "pri": pri, "queue": queue})
            }
            Response::Ok => json!({"status": "ok"}),
            Response::NoJob => json!({"status": "no-job"}),
            Response::Error => json!({"status": "error"}),
        }
    }

    pub fn to_line(&self) -> String {
        let mut s = self.to_json().to_string();
        s.push('\n');
        s
    }
}

/// Parses one line of input into a [`Request`], or `None` if it doesn't
/// match any known request shape (the caller replies [`Response::Error`]).
pub fn parse_request(line: &str) -> Option<Request> {
    serde_json::from_str(line).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put() {
        let req = parse_request(r#"{"request":"put","queue":"q1","job":{"a":1},"pri":10}"#).unwrap();
        assert!(matches!(req, Request::Put { pri: 10, .. }));
    }

    #[test]
    fn parses_get_with_default_wait() {
        let req = parse_request(r#"{"request":"get","queues":["q1","q2"]}"#).unwrap();
        match req {
            Request::Get { queues, wait } => {
                assert_eq!(queues, vec!["q1", "q2"]);
                assert!(!wait);
            }
            _ => panic!("expected Get"),
        }
    }

    #[test]
    fn rejects_unknown_request() {
        assert!(parse_request(r#"{"request":"frobnicate"}"#).is_none());
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_request("not json").is_none());
    }
}
