//! Classification of failed responses.

use reqwest::Response;
use serde::Deserialize;
use tally_core::{RemoteError, RemoteResult};

#[derive(Debug, Deserialize)]
struct ProblemBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Pass 2xx responses through; turn everything else into
/// [`RemoteError::Rejected`] carrying the most useful text the body offers.
pub(crate) async fn ensure_success(
    operation: &'static str,
    response: Response,
) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let bytes = response.bytes().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        operation,
        status: status.as_u16(),
        detail: problem_detail(&bytes),
    })
}

fn problem_detail(bytes: &[u8]) -> String {
    if let Ok(problem) = serde_json::from_slice::<ProblemBody>(bytes)
        && let Some(text) = problem.detail.or(problem.message).or(problem.title)
    {
        return text;
    }
    String::from_utf8_lossy(bytes).trim().to_string()
}

pub(crate) fn transport(operation: &'static str, err: reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        operation,
        source: Box::new(err),
    }
}

pub(crate) fn decode(operation: &'static str, err: reqwest::Error) -> RemoteError {
    RemoteError::Decode {
        operation,
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_problem_fields_then_raw_text() {
        assert_eq!(
            problem_detail(br#"{"title":"Bad","detail":"title too short"}"#),
            "title too short"
        );
        assert_eq!(problem_detail(br#"{"title":"Conflict"}"#), "Conflict");
        assert_eq!(problem_detail(b"  upstream exploded \n"), "upstream exploded");
        assert_eq!(problem_detail(b""), "");
    }
}
