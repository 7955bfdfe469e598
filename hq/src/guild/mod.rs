//! Guild: shared parties joined by invite code

mod error;
mod manager;

pub use error::GuildError;
pub use manager::{GuildManager, GuildOverview, INVITE_CODE_LEN, MemberSummary, generate_invite_code};
