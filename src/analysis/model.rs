//! Job data model: ids, analysis kinds, typed results, and the job state.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of random bytes behind a job id (rendered as twice as many hex chars).
const JOB_ID_BYTES: usize = 16;

/// Opaque, unguessable job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Fresh id from the OS CSPRNG: 128 bits as 32 lowercase hex chars.
    pub fn generate() -> Self {
        let mut bytes = [0u8; JOB_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which analysis flow a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Scored review with improvement points and improved code.
    Review,
    /// Bug finder: list of mistakes plus fixed code.
    Bugs,
    /// Returns the code with explanatory comments added.
    Comments,
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Review => write!(f, "review"),
            Self::Bugs => write!(f, "bugs"),
            Self::Comments => write!(f, "comments"),
        }
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "review" => Ok(Self::Review),
            "bugs" => Ok(Self::Bugs),
            "comments" => Ok(Self::Comments),
            _ => Err(format!("Unknown analysis kind: {}", s)),
        }
    }
}

/// One suggested improvement, anchored to a source line when the model gives one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementPoint {
    #[serde(default)]
    pub line: Option<u32>,
    pub point: String,
}

/// Scored code review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    #[serde(deserialize_with = "deserialize_score")]
    pub quality_score: u8,
    #[serde(default)]
    pub improvement_points: Vec<ImprovementPoint>,
    pub improved_code: String,
}

/// Bug-finder output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReport {
    #[serde(default)]
    pub mistakes: Vec<String>,
    pub fixed_code: String,
}

/// Source annotated with explanatory comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentedCode {
    pub commented_code: String,
}

/// Payload of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Review(ReviewReport),
    Bugs(BugReport),
    Comments(CommentedCode),
}

/// Models sometimes answer `85.0` or `"85"`; accept any number in 0..=100.
fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    use serde::de::Error;

    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = match &raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| D::Error::custom(format!("qualityScore is not a number: {raw}")))?;

    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(D::Error::custom(format!(
            "qualityScore {value} outside 0..=100"
        )));
    }
    Ok(value.round() as u8)
}

/// Wire-level status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Complete,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle state. The result exists exactly when the job is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Complete(AnalysisResult),
    Error { message: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Complete(_) => JobStatus::Complete,
            Self::Error { .. } => JobStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Snapshot of one tracked analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub kind: AnalysisKind,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(id: JobId, kind: AnalysisKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResultRef<'a> {
    Analysis(&'a AnalysisResult),
    Failure { message: &'a str },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobWire<'a> {
    job_id: &'a JobId,
    kind: AnalysisKind,
    status: JobStatus,
    result: Option<ResultRef<'a>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Serialize for Job {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = match &self.state {
            JobState::Pending => None,
            JobState::Complete(analysis) => Some(ResultRef::Analysis(analysis)),
            JobState::Error { message } => Some(ResultRef::Failure { message }),
        };
        JobWire {
            job_id: &self.id,
            kind: self.kind,
            status: self.status(),
            result,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_fixed_length_hex_and_distinct() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn pending_job_serializes_null_result() {
        let job = Job::new(JobId::from("abc"), AnalysisKind::Review);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json["result"].is_null());
        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["kind"], "review");
    }

    #[test]
    fn error_job_serializes_message() {
        let mut job = Job::new(JobId::from("abc"), AnalysisKind::Bugs);
        job.state = JobState::Error {
            message: "nope".into(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["result"]["message"], "nope");
    }

    #[test]
    fn complete_review_serializes_camel_case() {
        let mut job = Job::new(JobId::from("abc"), AnalysisKind::Review);
        job.state = JobState::Complete(AnalysisResult::Review(ReviewReport {
            quality_score: 80,
            improvement_points: vec![ImprovementPoint {
                line: Some(3),
                point: "avoid global var".into(),
            }],
            improved_code: "let x=1;".into(),
        }));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["result"]["qualityScore"], 80);
        assert_eq!(json["result"]["improvementPoints"][0]["line"], 3);
        assert_eq!(json["result"]["improvedCode"], "let x=1;");
    }

    #[test]
    fn score_accepts_float_and_string() {
        let r: ReviewReport =
            serde_json::from_str(r#"{"qualityScore":84.6,"improvedCode":""}"#).unwrap();
        assert_eq!(r.quality_score, 85);
        let r: ReviewReport =
            serde_json::from_str(r#"{"qualityScore":"70","improvedCode":""}"#).unwrap();
        assert_eq!(r.quality_score, 70);
        assert!(serde_json::from_str::<ReviewReport>(r#"{"qualityScore":140,"improvedCode":""}"#).is_err());
        assert!(serde_json::from_str::<ReviewReport>(r#"{"qualityScore":null,"improvedCode":""}"#).is_err());
    }

    #[test]
    fn state_terminality() {
        assert!(!JobState::Pending.is_terminal());
        assert!(JobState::Error { message: "x".into() }.is_terminal());
        assert_eq!(JobStatus::Complete.to_string(), "complete");
        assert_eq!("bugs".parse::<AnalysisKind>(), Ok(AnalysisKind::Bugs));
    }
}
