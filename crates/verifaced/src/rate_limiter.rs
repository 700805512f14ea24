use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum consecutive failures before lockout.
const MAX_FAILURES: u32 = 5;
/// Sliding window over which failures are counted.
const WINDOW: Duration = Duration::from_secs(60);
/// Lockout duration after exceeding MAX_FAILURES.
const LOCKOUT: Duration = Duration::from_secs(300);

struct SubjectRecord {
    failures: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// Per-subject limiter for verification attempts.
///
/// After MAX_FAILURES denied verifications within WINDOW seconds the
/// subject is locked out for LOCKOUT seconds. Pipeline errors (extractor
/// down, decode failure) are not counted — only a deliberate deny
/// increments the counter, so an attacker cannot be saved by outages and
/// a legitimate user is not punished for them.
pub struct RateLimiter {
    records: HashMap<String, SubjectRecord>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Return `Ok(())` if the subject may attempt verification,
    /// `Err(message)` if currently locked out.
    pub fn check(&mut self, subject: &str) -> Result<(), String> {
        let now = Instant::now();
        let record = self
            .records
            .entry(subject.to_string())
            .or_insert(SubjectRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if let Some(locked_until) = record.locked_until {
            if now < locked_until {
                let remaining = locked_until.duration_since(now).as_secs();
                return Err(format!(
                    "too many failed attempts; try again in {remaining}s"
                ));
            }
            // Lockout expired — reset
            *record = SubjectRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            };
        } else if now.duration_since(record.window_start) >= WINDOW {
            // Sliding window expired — reset failure counter
            record.failures = 0;
            record.window_start = now;
        }

        Ok(())
    }

    /// Record a denied verification. May trigger a lockout.
    pub fn record_failure(&mut self, subject: &str) {
        let now = Instant::now();
        let record = self
            .records
            .entry(subject.to_string())
            .or_insert(SubjectRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if now.duration_since(record.window_start) >= WINDOW {
            record.failures = 0;
            record.window_start = now;
        }

        record.failures += 1;
        if record.failures >= MAX_FAILURES {
            record.locked_until = Some(now + LOCKOUT);
            tracing::warn!(
                subject,
                failures = record.failures,
                lockout_secs = LOCKOUT.as_secs(),
                "rate limit triggered — locking subject"
            );
        } else {
            tracing::debug!(
                subject,
                failures = record.failures,
                max = MAX_FAILURES,
                "verification denied — incrementing failure counter"
            );
        }
    }

    /// Record a successful verification — reset the failure counter.
    pub fn record_success(&mut self, subject: &str) {
        self.records.remove(subject);
    }
}
