//! HTTP handlers
//!
//! Auth handlers live with the credential store in `core::auth::handlers`.

pub mod billing;
pub mod chat;
pub mod conversations;
pub mod status;

pub use billing::{
    billing_config, checkout_cancel, checkout_success, create_checkout_session, webhook,
};
pub use chat::chat;
pub use conversations::{get_conversation, list_conversations};
pub use status::status;
