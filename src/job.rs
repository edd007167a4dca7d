use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Error, retry::RetryValue, sidekiq};

/// The job payload as it is encoded in Redis.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct JobData {
    class: String,
    queue: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<Value>,
    retry: RetryValue,
    jid: String,
    created_at: f64,
    enqueued_at: f64,
}

/// A background job, in the JSON format Sidekiq uses.
///
/// A job built locally gets its identifier, timestamps and retry policy
/// filled in when it is enqueued.
#[derive(Debug, Default)]
pub struct Job {
    enc: JobData,

    created_at: Option<DateTime<Utc>>,
    enqueued_at: Option<DateTime<Utc>>,

    custom_retry_policy: bool,
}

impl Job {
    pub fn new() -> Job {
        Job::default()
    }

    pub(crate) fn from_json(data: &[u8]) -> Result<Job, Error> {
        let enc: JobData = serde_json::from_slice(data)?;
        let created_at = Some(sidekiq::to_time(enc.created_at));
        let enqueued_at = Some(sidekiq::to_time(enc.enqueued_at));
        Ok(Job {
            enc,
            created_at,
            enqueued_at,
            custom_retry_policy: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.enc.jid
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Job {
        self.enc.jid = id.into();
        self
    }

    /// Returns the name of the handler that implements the job, e.g. the
    /// Ruby class on the consuming side.
    pub fn class(&self) -> &str {
        &self.enc.class
    }

    pub fn set_class(&mut self, class: impl Into<String>) -> &mut Job {
        self.enc.class = class.into();
        self
    }

    pub fn queue(&self) -> &str {
        &self.enc.queue
    }

    pub fn set_queue(&mut self, queue: impl Into<String>) -> &mut Job {
        self.enc.queue = queue.into();
        self
    }

    pub fn args(&self) -> &[Value] {
        &self.enc.args
    }

    pub fn set_args(&mut self, args: Vec<Value>) -> &mut Job {
        self.enc.args = args;
        self
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn set_created_at(&mut self, t: DateTime<Utc>) -> &mut Job {
        self.created_at = Some(t);
        self
    }

    pub fn enqueued_at(&self) -> Option<DateTime<Utc>> {
        self.enqueued_at
    }

    /// Reports whether the job should be retried if it fails.
    pub fn retry(&self) -> bool {
        self.enc.retry.ok
    }

    /// Configures whether the job should be retried if it fails.
    pub fn set_retry(&mut self, retry: bool) -> &mut Job {
        self.custom_retry_policy = true;
        self.enc.retry.ok = retry;
        self
    }

    /// Returns how many times the job should be retried, 0 meaning the
    /// retrying system's default count.
    pub fn retry_times(&self) -> i64 {
        self.enc.retry.times
    }

    /// Configures how many times the job should be retried. Values outside
    /// of 0..=100 are ignored.
    ///
    /// Calling this always enables retries, because 0 stands for the
    /// default retry count. Use `set_retry(false)` to disable retries.
    pub fn set_retry_times(&mut self, n: i64) -> &mut Job {
        if (0..=100).contains(&n) {
            self.custom_retry_policy = true;
            self.enc.retry.ok = true;
            self.enc.retry.times = n;
        }
        self
    }

    pub(crate) fn set_defaults(&mut self) {
        if self.enc.queue.is_empty() {
            self.enc.queue = "default".to_string();
        }

        let now = Utc::now();
        self.enqueued_at = Some(now);
        self.enc.enqueued_at = sidekiq::to_float(now);

        let created_at = match self.created_at {
            Some(t) => t,
            None => {
                self.created_at = Some(now);
                now
            }
        };
        self.enc.created_at = sidekiq::to_float(created_at);

        if self.enc.jid.is_empty() {
            self.enc.jid = sidekiq::job_id();
        }

        if !self.custom_retry_policy {
            self.enc.retry.ok = true;
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(&self.enc).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_with_required_values_set_manually() {
        let created_at = Utc.timestamp(1669852800, 0);

        let mut job = Job::new();
        job.set_id("1234567890abcdef12345678")
            .set_class("RubyWorker")
            .set_queue("ruby_jobs")
            .set_retry_times(3)
            .set_args(vec![json!(1), json!("User")])
            .set_created_at(created_at);

        job.set_defaults();
        let enc = job.encode().unwrap();

        let mut encoding: Value = serde_json::from_slice(&enc).unwrap();

        // enqueued_at is stamped with the current time; pull it out and
        // check it separately.
        let enqueued_at = encoding["enqueued_at"].as_f64().unwrap();
        let now = Utc::now();
        assert!((now - sidekiq::to_time(enqueued_at)).num_seconds().abs() <= 1);
        encoding.as_object_mut().unwrap().remove("enqueued_at");

        assert_eq!(
            encoding,
            json!({
                "jid": "1234567890abcdef12345678",
                "class": "RubyWorker",
                "queue": "ruby_jobs",
                "args": [1, "User"],
                "created_at": sidekiq::to_float(created_at),
                "retry": 3,
            })
        );

        // Getters.
        assert_eq!(job.id(), "1234567890abcdef12345678");
        assert_eq!(job.class(), "RubyWorker");
        assert_eq!(job.queue(), "ruby_jobs");
        assert!(job.retry());
        assert_eq!(job.retry_times(), 3);
        assert_eq!(job.args(), &[json!(1), json!("User")]);
        assert_eq!(job.created_at(), Some(created_at));

        // Getters after decoding.
        let decoded = Job::from_json(&enc).unwrap();
        assert_eq!(decoded.id(), "1234567890abcdef12345678");
        assert_eq!(decoded.class(), "RubyWorker");
        assert_eq!(decoded.queue(), "ruby_jobs");
        assert!(decoded.retry());
        assert_eq!(decoded.retry_times(), 3);
        assert_eq!(decoded.args(), &[json!(1), json!("User")]);
        assert_eq!(decoded.created_at(), Some(created_at));
        assert_eq!(decoded.enqueued_at(), Some(sidekiq::to_time(enqueued_at)));
    }

    #[test]
    fn defaults_are_set_automatically() {
        let mut job = Job::new();
        job.set_class("RubyWorker");

        job.set_defaults();
        let enc = job.encode().unwrap();

        let encoding: Value = serde_json::from_slice(&enc).unwrap();

        let jid = encoding["jid"].as_str().unwrap();
        assert_eq!(jid.len(), 24);

        assert_eq!(encoding["class"], json!("RubyWorker"));
        assert_eq!(encoding["queue"], json!("default"));
        assert!(encoding.get("args").is_none());

        let created_at = encoding["created_at"].as_f64().unwrap();
        let enqueued_at = encoding["enqueued_at"].as_f64().unwrap();
        assert_eq!(created_at, enqueued_at);

        let now = Utc::now();
        assert!((now - sidekiq::to_time(enqueued_at)).num_seconds().abs() <= 1);

        assert_eq!(encoding["retry"], json!(true));

        // Getters.
        assert_eq!(job.id().len(), 24);
        assert_eq!(job.queue(), "default");
        assert!(job.retry());
        assert_eq!(job.retry_times(), 0);
        assert!(job.args().is_empty());
        assert_eq!(job.created_at(), job.enqueued_at());

        // Getters after decoding.
        let decoded = Job::from_json(&enc).unwrap();
        assert_eq!(decoded.id().len(), 24);
        assert_eq!(decoded.class(), "RubyWorker");
        assert_eq!(decoded.queue(), "default");
        assert!(decoded.retry());
        assert_eq!(decoded.retry_times(), 0);
        assert!(decoded.args().is_empty());
        assert_eq!(decoded.created_at(), decoded.enqueued_at());
        assert!((now - decoded.created_at().unwrap()).num_seconds().abs() <= 1);
    }

    #[test]
    fn retry_times_zero_means_retry_true() {
        let mut job = Job::new();
        job.set_retry_times(0);

        assert!(job.retry());
        assert_eq!(job.retry_times(), 0);

        let decoded = Job::from_json(&job.encode().unwrap()).unwrap();
        assert!(decoded.retry());
        assert_eq!(decoded.retry_times(), 0);
    }

    #[test]
    fn wire_retry_zero_means_retry_false() {
        let decoded = Job::from_json(br#"{"retry":0}"#).unwrap();
        assert!(!decoded.retry());
        assert_eq!(decoded.retry_times(), 0);
    }

    #[test]
    fn set_retry_false() {
        let mut job = Job::new();
        job.set_retry(false);

        assert!(!job.retry());
        assert_eq!(job.retry_times(), 0);

        let decoded = Job::from_json(&job.encode().unwrap()).unwrap();
        assert!(!decoded.retry());
        assert_eq!(decoded.retry_times(), 0);
    }

    #[test]
    fn set_retry_true() {
        let mut job = Job::new();
        job.set_retry(true);

        assert!(job.retry());
        assert_eq!(job.retry_times(), 0);

        let decoded = Job::from_json(&job.encode().unwrap()).unwrap();
        assert!(decoded.retry());
        assert_eq!(decoded.retry_times(), 0);
    }

    #[test]
    fn retry_times_out_of_range_is_ignored() {
        for n in [-5, 101, 999].iter() {
            let mut job = Job::new();
            job.set_retry_times(*n);

            assert!(!job.retry());
            assert_eq!(job.retry_times(), 0);

            let decoded = Job::from_json(&job.encode().unwrap()).unwrap();
            assert!(!decoded.retry());
            assert_eq!(decoded.retry_times(), 0);
        }
    }

    #[test]
    fn default_retry_survives_enqueue_defaults() {
        // A job with no explicit retry policy gets retry=true on enqueue; an
        // explicit opt-out is preserved.
        let mut plain = Job::new();
        plain.set_defaults();
        assert!(plain.retry());

        let mut no_retry = Job::new();
        no_retry.set_retry(false);
        no_retry.set_defaults();
        assert!(!no_retry.retry());
    }
}
