mod pending;
mod sync_log;

pub use pending::draw_pending;
pub use sync_log::draw_sync_log;
