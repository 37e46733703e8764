use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

/// Locally persisted abuse-detector verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRecord {
    pub expires_at: DateTime<Utc>,
    pub rule_id: String,
    pub duration_minutes: u32,
}

impl BlockRecord {
    pub fn starting_at(now: DateTime<Utc>, verdict: &BlockVerdict) -> Self {
        Self {
            expires_at: now + Duration::minutes(i64::from(verdict.duration_minutes)),
            rule_id: verdict.rule_id.clone(),
            duration_minutes: verdict.duration_minutes,
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockState {
    Clear,
    Blocked(BlockRecord),
}

/// Result of the enforcement check run before page logic or network calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enforcement {
    /// No active record, or an expired one that was purged.
    Proceed,
    /// Record about to expire; left alone so the blocked page does not bounce.
    Lapsing(BlockRecord),
    /// Active record; the caller has been sent to the blocked destination.
    Redirected(BlockRecord),
}

impl Enforcement {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Enforcement::Redirected(_))
    }
}

/// Verdict as signalled by the remote abuse detector in a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerdict {
    pub rule_id: String,
    pub duration_minutes: u32,
}

const UNKNOWN_RULE: &str = "unknown";

impl BlockVerdict {
    /// Extracts a verdict from a response.
    ///
    /// A body carrying `blocked: true` or `status: "blocked"` is a verdict on
    /// any status code. A 403 is a verdict when its body names a `rule`.
    pub fn from_response(status: u16, body: &str, default_minutes: u32) -> Option<Self> {
        let value: Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        let flagged = object.get("blocked").and_then(Value::as_bool) == Some(true)
            || object.get("status").and_then(Value::as_str) == Some("blocked");
        let rule = object.get("rule").and_then(Value::as_str);
        if !flagged && !(status == 403 && rule.is_some()) {
            return None;
        }

        let duration_minutes = object
            .get("duration")
            .and_then(Value::as_u64)
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or(default_minutes);

        Some(Self {
            rule_id: rule.unwrap_or(UNKNOWN_RULE).to_owned(),
            duration_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_flag_is_a_verdict() {
        let verdict = BlockVerdict::from_response(
            200,
            r#"{"blocked":true,"rule":"burst-login","duration":5}"#,
            15,
        );
        assert_eq!(
            verdict,
            Some(BlockVerdict {
                rule_id: "burst-login".into(),
                duration_minutes: 5
            })
        );
    }

    #[test]
    fn blocked_status_is_a_verdict() {
        let verdict =
            BlockVerdict::from_response(429, r#"{"status":"blocked","rule":"scraper"}"#, 15)
                .expect("verdict");
        assert_eq!(verdict.rule_id, "scraper");
        assert_eq!(verdict.duration_minutes, 15);
    }

    #[test]
    fn forbidden_with_rule_is_a_verdict() {
        let verdict = BlockVerdict::from_response(403, r#"{"rule":"geo","duration":60}"#, 15)
            .expect("verdict");
        assert_eq!(verdict.duration_minutes, 60);
    }

    #[test]
    fn plain_errors_are_not_verdicts() {
        assert_eq!(BlockVerdict::from_response(403, r#"{"error":"nope"}"#, 15), None);
        assert_eq!(BlockVerdict::from_response(200, r#"{"blocked":false}"#, 15), None);
        assert_eq!(BlockVerdict::from_response(403, "<html>denied</html>", 15), None);
        assert_eq!(BlockVerdict::from_response(200, "", 15), None);
    }

    #[test]
    fn verdict_without_rule_gets_placeholder() {
        let verdict = BlockVerdict::from_response(200, r#"{"blocked":true}"#, 15).expect("verdict");
        assert_eq!(verdict.rule_id, "unknown");
    }

    #[test]
    fn record_expiry_follows_duration() {
        let now = Utc::now();
        let record = BlockRecord::starting_at(
            now,
            &BlockVerdict {
                rule_id: "r".into(),
                duration_minutes: 5,
            },
        );
        assert_eq!(record.remaining(now), Duration::minutes(5));
    }
}
