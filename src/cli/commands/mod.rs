mod config;
mod query;
mod seed;
mod status;

pub use config::ConfigCommand;
pub use query::QueryArgs;
pub use seed::SeedArgs;

pub use config::handle_config;
pub use query::handle_query;
pub use seed::handle_seed;
pub use status::handle_status;
