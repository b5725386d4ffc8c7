use crate::core::{ids::UserId, session::Rejected};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error in {file}: {message}")]
    Storage { file: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),

    #[error("{0}")]
    Rejected(#[from] Rejected),

    #[error("<@{user}> is not a registered contestant yet. Use `.tr reg` first!")]
    NotRegistered { user: UserId },

    #[error("You are already registered in this server.")]
    AlreadyRegistered,

    #[error("You can't date yourself!")]
    SelfDateDenied,

    #[error("You already sent a date request to that user today.")]
    DuplicateRequest,

    #[error("You've already sent {limit} date request(s) today!")]
    QuotaExceeded { limit: usize },

    #[error("No pending date request from <@{requester}>.")]
    NoMatchingRequest { requester: UserId },

    #[error("Today's campfire already ended. Wait until tomorrow!")]
    CampfireEnded,

    #[error("You already have a Pokémon!")]
    AlreadyOwnsPet,

    #[error("You don't have a Pokémon yet! Use `.poke catch` first.")]
    NoPet,

    #[error("No Pokémon are available to catch. Try again later.")]
    NoPokemonAvailable,

    #[error("Asset missing: {what}")]
    AssetMissing { what: String },

    #[error("Not enough contestants (need at least {needed}).")]
    NotEnoughContestants { needed: usize },

    #[error("MyDay has already been started today.")]
    MyDayAlreadyStarted,

    #[error("No MyDay session today.")]
    MyDayNotStarted,

    #[error("You were not chosen for MyDay today.")]
    NotChosen,

    #[error("No {what} content is available.")]
    NoContent { what: String },

    #[error("This command can only be used in DMs.")]
    DirectMessageOnly,

    #[error("This command can only be used in a server.")]
    GuildOnly,

    #[error("Could not deliver a direct message to <@{user}>")]
    DeliveryFailed { user: UserId },
}

impl Error {
    /// Whether the error describes a refused game action rather than a failure.
    ///
    /// User-facing errors are answered with their own description and never
    /// leave partial state behind. Everything else is an infrastructure failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. }
                | Self::Storage { .. }
                | Self::Io(_)
                | Self::Json(_)
                | Self::EnvVar(_)
                | Self::Fmt(_)
                | Self::FrameworkError(_)
                | Self::DeliveryFailed { .. }
        )
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
