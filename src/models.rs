//! These models represent the objects passed around by the loop
//!
//! There are several related formats we need to interact with:
//! - anthropic content blocks, sent between the loop and the LLM
//! - openai chat messages/tools, in both the chat and responses styles
//! - google generateContent turns, used directly and via the managed platform
//! - tool catalog requests, sent from the loop to the tool implementations
//!
//! These overlap to varying degrees. Adapters translate to and from the
//! internal structs on every call; vendor-specific fragments ride inside a
//! message as opaque items that only the owning adapter interprets.
pub mod message;
pub mod role;
pub mod tool;
