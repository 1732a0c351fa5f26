pub mod api;
pub mod ident;
pub mod models;
pub mod placement;
pub mod sanctuary;
