mod code;
mod data;
mod export;
mod health_check;
mod schema;
mod subscriptions;

pub use code::*;
pub use data::*;
pub use export::*;
pub use health_check::*;
pub use schema::*;
pub use subscriptions::*;
