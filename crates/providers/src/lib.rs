//! Provider adapter implementations and the completion gateway for Palaver.

pub mod anthropic;
pub mod gateway;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use gateway::{build_from_config, ProviderGateway, RequestParams};
pub use openai::OpenAiAdapter;
