pub mod catalog;
pub mod chat;
pub mod contact;
pub mod websocket;
