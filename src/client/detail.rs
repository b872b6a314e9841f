use super::decisions::{decisions_from_document, Decision};
use super::error::ClientError;
use super::meetings::MeetingSummary;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// The six fetches behind a meeting detail view, in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    Main,
    Activities,
    Decisions,
    ForeseenActivities,
    VoteResults,
    MeetingDecisions,
}

impl SubResource {
    pub const ALL: [SubResource; 6] = [
        SubResource::Main,
        SubResource::Activities,
        SubResource::Decisions,
        SubResource::ForeseenActivities,
        SubResource::VoteResults,
        SubResource::MeetingDecisions,
    ];

    /// Path below `/api/meetings`. The meeting-decisions view reads the
    /// decisions resource a second time.
    pub fn path(self, meeting_id: &str) -> String {
        let suffix = match self {
            SubResource::Main => "",
            SubResource::Activities => "/activities",
            SubResource::Decisions | SubResource::MeetingDecisions => "/decisions",
            SubResource::ForeseenActivities => "/foreseen-activities",
            SubResource::VoteResults => "/vote-results",
        };
        format!("/{}{}", meeting_id, suffix)
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubResource::Main => "meeting",
            SubResource::Activities => "activities",
            SubResource::Decisions => "decisions",
            SubResource::ForeseenActivities => "foreseen activities",
            SubResource::VoteResults => "vote results",
            SubResource::MeetingDecisions => "meeting decisions",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeetingDetail {
    pub meeting: Value,
    pub activities: Value,
    pub decisions: Value,
    pub foreseen_activities: Value,
    pub vote_results: Value,
    pub meeting_decisions: Value,
}

impl MeetingDetail {
    pub fn summary(&self) -> MeetingSummary {
        let record = self
            .meeting
            .get("data")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .unwrap_or(&self.meeting);
        MeetingSummary::from_value(record)
    }

    pub fn vote_decisions(&self) -> Vec<Decision> {
        decisions_from_document(&self.meeting_decisions)
    }

    /// Number of entries in a sub-resource's `data` list.
    pub fn count(&self, resource: SubResource) -> usize {
        let document = match resource {
            SubResource::Main => &self.meeting,
            SubResource::Activities => &self.activities,
            SubResource::Decisions => &self.decisions,
            SubResource::ForeseenActivities => &self.foreseen_activities,
            SubResource::VoteResults => &self.vote_results,
            SubResource::MeetingDecisions => &self.meeting_decisions,
        };
        document
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

/// Outcome of the detail fan-out: all six parts or nothing.
#[derive(Debug)]
pub enum FanOut {
    Complete(Box<MeetingDetail>),
    Failed {
        resource: SubResource,
        error: ClientError,
    },
}

impl FanOut {
    pub fn is_complete(&self) -> bool {
        matches!(self, FanOut::Complete(_))
    }

    pub fn user_message(&self) -> Option<String> {
        match self {
            FanOut::Complete(_) => None,
            FanOut::Failed { error, .. } => Some(error.user_message()),
        }
    }
}

/// Runs `fetch` for every [`SubResource`] concurrently and waits for all of
/// them. The first failure in sub-resource order wins; nothing is cancelled.
pub async fn join_detail<F, Fut>(fetch: F) -> FanOut
where
    F: Fn(SubResource) -> Fut,
    Fut: Future<Output = Result<Value, ClientError>>,
{
    let results = futures::future::join_all(SubResource::ALL.iter().map(|r| fetch(*r))).await;

    let mut parts = Vec::with_capacity(SubResource::ALL.len());
    for (resource, result) in SubResource::ALL.into_iter().zip(results) {
        match result {
            Ok(value) => parts.push(value),
            Err(error) => {
                tracing::warn!("Detail fetch for {} failed: {}", resource, error);
                return FanOut::Failed { resource, error };
            }
        }
    }

    let mut parts = parts.into_iter();
    let mut next = || parts.next().unwrap_or_default();
    FanOut::Complete(Box::new(MeetingDetail {
        meeting: next(),
        activities: next(),
        decisions: next(),
        foreseen_activities: next(),
        vote_results: next(),
        meeting_decisions: next(),
    }))
}
