pub mod client;

pub use basechat_api_types;
pub use client::ApiClient;
