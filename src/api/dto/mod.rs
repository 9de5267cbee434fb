mod message;

pub use message::{MessageResponse, RestrictedResponse};
