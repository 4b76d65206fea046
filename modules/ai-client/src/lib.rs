pub mod error;
pub mod llama;
pub mod response;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use llama::Llama;
pub use response::ChatResponse;
pub use traits::{ChatModel, Message, MessageRole};
pub use util::{extract_json_object, truncate_to_char_boundary};
