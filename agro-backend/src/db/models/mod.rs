//! Database operations, one file per table.

mod cache_entry;
mod chat_message;
mod conversation;
