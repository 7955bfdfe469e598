//! Change feed coordinator and dashboard snapshots

mod coordinator;
mod view;

pub use coordinator::FeedHandle;
pub use view::{Aggregate, DashboardView};
