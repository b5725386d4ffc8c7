//! Per-thread command allow-lists.

use crate::{
    core::ids::ChannelId,
    store::ThreadRestrictions,
};

/// Whether `command` may run in `channel`.
///
/// Channels without an allow-list, or with an empty one, accept everything.
/// Otherwise the root command name must be listed (case-insensitive).
#[must_use]
pub fn is_allowed(restrictions: &ThreadRestrictions, channel: ChannelId, command: &str) -> bool {
    restrictions
        .0
        .get(&channel)
        .filter(|allowed| !allowed.is_empty())
        .is_none_or(|allowed| allowed.iter().any(|name| name.eq_ignore_ascii_case(command)))
}

/// Commands allowed in `channel`; empty when unrestricted.
#[must_use]
pub fn allowed_in(restrictions: &ThreadRestrictions, channel: ChannelId) -> &[String] {
    restrictions.0.get(&channel).map_or(&[], Vec::as_slice)
}
