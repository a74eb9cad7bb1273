mod analysis;
mod process_stat;
mod system_info;
mod trace_event;

pub use analysis::*;
pub use process_stat::*;
pub use system_info::*;
pub use trace_event::*;
