//! View-side aggregation over the caching proxy: the recent-meetings
//! window, the six-part meeting detail and lazy voter identity lookup.

pub mod api;
pub mod decisions;
pub mod detail;
pub mod error;
pub mod identity;
pub mod meetings;
pub mod session;

pub use api::{ViewClient, DEFAULT_PROXY_URL};
pub use decisions::{Decision, DecisionPanel, VoteCategory};
pub use detail::{join_detail, FanOut, MeetingDetail, SubResource};
pub use error::ClientError;
pub use identity::{IdentityResolver, PersonIdentity, VoterRow};
pub use meetings::{window_offset, MeetingSummary};
pub use session::{DetailSession, DetailState, DetailTicket};
