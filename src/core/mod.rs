pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod extract;
pub mod feeds;
pub mod normalize;
pub mod variant;
