pub mod dedup;
pub mod poll_loop;
pub mod supervisor;

pub use dedup::RecentlySeen;
pub use poll_loop::PollReplyLoop;
pub use supervisor::AgentSupervisor;
