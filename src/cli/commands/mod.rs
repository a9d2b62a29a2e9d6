mod add;
mod check;
mod list;
mod sweep;

pub use add::cmd_add_query;
pub use check::cmd_check;
pub use list::cmd_list_queries;
pub use sweep::cmd_sweep;
