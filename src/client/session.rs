use super::decisions::{Decision, DecisionPanel, VoteCategory};
use super::detail::{FanOut, MeetingDetail};
use super::identity::{IdentityResolver, VoterRow};

/// Issued by [`DetailSession::select`]; only the newest ticket is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTicket {
    generation: u64,
    meeting_id: String,
}

impl DetailTicket {
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }
}

#[derive(Debug, Default)]
pub enum DetailState {
    #[default]
    Idle,
    Loading,
    Ready(Box<MeetingDetail>),
    Error(String),
}

/// The meeting currently shown in detail, plus its decision disclosures.
#[derive(Debug, Default)]
pub struct DetailSession {
    generation: u64,
    selected: Option<String>,
    state: DetailState,
    panel: DecisionPanel,
}

impl DetailSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts showing `meeting_id`. Any fetch still running for an earlier
    /// selection will have its result discarded.
    pub fn select(&mut self, meeting_id: &str) -> DetailTicket {
        self.generation += 1;
        self.selected = Some(meeting_id.to_string());
        self.state = DetailState::Loading;
        self.panel = DecisionPanel::new();
        DetailTicket {
            generation: self.generation,
            meeting_id: meeting_id.to_string(),
        }
    }

    /// Applies a finished fan-out. Returns false when the ticket was
    /// superseded and the outcome was dropped.
    pub fn accept(&mut self, ticket: &DetailTicket, outcome: FanOut) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!("Dropping stale detail for {}", ticket.meeting_id);
            return false;
        }

        self.state = match outcome {
            FanOut::Complete(detail) => DetailState::Ready(detail),
            FanOut::Failed { error, .. } => DetailState::Error(error.user_message()),
        };
        true
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn panel(&self) -> &DecisionPanel {
        &self.panel
    }

    /// Toggles a vote-category disclosure. When it ends up open, the
    /// category's voters are resolved and returned; closing yields `None`.
    pub async fn expand_decision(
        &mut self,
        resolver: &IdentityResolver,
        decision: &Decision,
        category: VoteCategory,
    ) -> Option<Vec<VoterRow>> {
        self.panel.toggle(&decision.id, category)?;

        self.panel.set_loading(&decision.id, category, true);
        let rows = resolver.resolve_batch(decision.voters(category)).await;
        self.panel.set_loading(&decision.id, category, false);
        Some(rows)
    }
}
