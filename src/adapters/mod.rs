// Adapters layer: concrete implementations for external systems (portal login, http, storage).

pub mod auth;
pub mod http;
pub mod storage;
