pub mod feed;
pub mod fetch;
pub mod introspect;
pub mod output;
pub mod parser;
pub mod schema;
pub mod stats;
pub mod wire;
