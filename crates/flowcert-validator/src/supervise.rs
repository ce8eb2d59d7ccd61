//! Time-bounded regex evaluation.
//!
//! The match runs on tokio's blocking pool and the caller waits on it for at
//! most the configured limit. On timeout the caller gets
//! [`FlowError::RegexTimeout`] immediately, but the abandoned match is not
//! cancelled: it keeps its blocking thread until it returns on its own.

use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};

use flowcert_types::{FlowError, Result};

pub const DEFAULT_REGEX_TIMEOUT: Duration = Duration::from_secs(2);

/// Run `work` on the blocking pool, waiting at most `limit`.
pub async fn supervise<T, F>(pattern: &str, limit: Duration, work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join)) => Err(FlowError::Other(format!("regex worker for '{pattern}' failed: {join}"))),
        Err(_) => {
            tracing::warn!(
                pattern = %pattern,
                timeout_ms = limit.as_millis() as u64,
                "Regex evaluation exceeded its time limit"
            );
            Err(FlowError::RegexTimeout {
                pattern: pattern.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })
        }
    }
}

/// Compile `pattern` with single-letter flags: `i`, `m`, `s`.
pub fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            other => {
                return Err(FlowError::RegexCompile {
                    pattern: pattern.to_string(),
                    message: format!("unknown flag '{other}'"),
                })
            }
        };
    }
    builder.build().map_err(|e| FlowError::RegexCompile {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// `regex.is_match(subject)` under supervision.
pub async fn supervised_match(regex: &Arc<Regex>, subject: String, limit: Duration) -> Result<bool> {
    let re = Arc::clone(regex);
    supervise(regex.as_str(), limit, move || re.is_match(&subject)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn flags() {
        assert!(compile_pattern("^YES$", "i").unwrap().is_match("yes"));
        assert!(compile_pattern("^b$", "m").unwrap().is_match("a\nb"));
        assert!(compile_pattern("a.b", "s").unwrap().is_match("a\nb"));
        assert!(!compile_pattern("a.b", "").unwrap().is_match("a\nb"));
    }

    #[test]
    fn bad_patterns_and_flags() {
        assert!(matches!(compile_pattern("(", ""), Err(FlowError::RegexCompile { .. })));
        let err = compile_pattern("a", "x").unwrap_err();
        assert!(err.to_string().contains("unknown flag 'x'"));
    }

    #[tokio::test]
    async fn fast_work_completes() {
        let re = Arc::new(compile_pattern(r"^\d+$", "").unwrap());
        assert!(supervised_match(&re, "12345".into(), DEFAULT_REGEX_TIMEOUT).await.unwrap());
        assert!(!supervised_match(&re, "12a45".into(), DEFAULT_REGEX_TIMEOUT).await.unwrap());
    }

    #[tokio::test]
    async fn slow_work_times_out_within_bound() {
        let started = Instant::now();
        let err = supervise("(a+)+$", Duration::from_millis(100), || {
            std::thread::sleep(Duration::from_millis(800));
            true
        })
        .await
        .unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(700));
        assert!(matches!(err, FlowError::RegexTimeout { timeout_ms: 100, .. }));
        assert!(err.is_infrastructure());
    }
}
