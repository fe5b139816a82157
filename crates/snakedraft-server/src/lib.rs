// Snake draft server: WebSocket front end over the draft engine.

pub mod app;
pub mod protocol;
pub mod ws_server;
