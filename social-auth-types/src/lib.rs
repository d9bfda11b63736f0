pub mod auth;
pub mod configuration;
pub mod stores;

pub use auth::*;
pub use configuration::{FacebookConfig, SocialAuthConfig, TwitterConfig};
pub use stores::{TokenStore, UserStore};
