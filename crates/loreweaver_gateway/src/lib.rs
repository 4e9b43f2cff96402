pub mod auth;
pub mod server;
pub mod types;

pub use auth::SingleUserAuth;
pub use server::GatewayServer;
pub use types::{ErrorResponse, GenerateSceneRequest, GenerateSceneResponse};
