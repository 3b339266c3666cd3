pub mod api;
pub mod crypto;
pub mod session;
pub mod state;
