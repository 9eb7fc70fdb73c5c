#![deny(unsafe_code)]

/// Desktop chat client for a hosted chat backend.
///
/// The app authenticates against an identity session provider, manages chats
/// through a GraphQL gateway, receives messages over a live feed, and
/// triggers bot replies through a webhook.
pub mod app;
/// Session lifecycle and the login/change-password views.
pub mod auth;
/// Chat workspace: sidebar, message list, input, feed wiring, bot trigger.
pub mod chat;
pub mod config;
