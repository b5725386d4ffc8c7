//! Discord command implementations organized by game.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Campfire confession commands (`cc`)
pub mod campfire;

/// Dating ledger commands (`tr`)
pub mod dating;

/// Drawing date command (`dd`)
pub mod drawing;

/// General utility commands
pub mod general;

/// MyDay commands (`myday`)
pub mod myday;

/// Personality test commands (`pt`)
pub mod personality;

/// Pokémon pet commands (`poke`)
pub mod pokemon;

// Export commands
pub use campfire::*;
pub use dating::*;
pub use drawing::*;
pub use general::*;
pub use myday::*;
pub use personality::*;
pub use pokemon::*;

use crate::{bot::BotData, errors::Error};

/// Every top-level command the framework registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        ping(),
        tr(),
        cc(),
        pt(),
        dd(),
        poke(),
        myday(),
    ]
}
