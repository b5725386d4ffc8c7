//! Core game logic - framework-agnostic minigames and the session engine.
//!
//! Nothing in here knows about serenity or poise. The bot layer converts
//! Discord ids into [`ids`] newtypes and renders the results.

/// Campfire confession game
pub mod campfire;
/// Dating ledger - registrations, requests, leaderboard and history
pub mod dating;
/// Two-player drawing dates
pub mod drawing;
/// Snowflake id newtypes
pub mod ids;
/// Daily MyDay invitations
pub mod myday;
/// Personality tests
pub mod personality;
/// Pokémon pet game
pub mod pokemon;
/// Session registry keyed by guild, thread or message
pub mod registry;
/// Per-thread command allow-lists
pub mod restriction;
/// Turn-based session state machine
pub mod session;
/// Cancellable inactivity timers
pub mod timer;
