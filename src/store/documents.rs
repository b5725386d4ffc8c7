//! Layouts of the JSON documents.
//!
//! Field names follow the files already in production, including the odd
//! `isPublic` key of the campfire record.

use super::Document;
use crate::core::ids::{ChannelId, GuildId, MessageId, UserId};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeTuple};
use std::fmt;

/// A registered dating contestant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    pub name: String,
    #[serde(default = "unknown_gender")]
    pub gender: String,
    /// Absent in records written before registration dates were kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<NaiveDate>,
}

fn unknown_gender() -> String {
    "?".to_string()
}

/// `{guildId: {userId: Contestant}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contestants(pub IndexMap<GuildId, IndexMap<UserId, Contestant>>);

impl Document for Contestants {
    const FILE: &'static str = "rocket_contestants.json";
}

impl Contestants {
    #[must_use]
    pub fn is_registered(&self, guild: GuildId, user: UserId) -> bool {
        self.0
            .get(&guild)
            .is_some_and(|users| users.contains_key(&user))
    }

    /// Registered users of `guild` in stored order.
    pub fn of_guild(&self, guild: GuildId) -> impl Iterator<Item = (UserId, &Contestant)> {
        self.0
            .get(&guild)
            .into_iter()
            .flat_map(|users| users.iter().map(|(id, c)| (*id, c)))
    }
}

/// `{guildId: {senderId: [[receiverId, "YYYY-MM-DD"], ...]}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateRequests(pub IndexMap<GuildId, IndexMap<UserId, Vec<(UserId, NaiveDate)>>>);

impl Document for DateRequests {
    const FILE: &'static str = "rocket_date_requests.json";
}

impl DateRequests {
    /// Pending requests sent by `sender` in `guild`.
    #[must_use]
    pub fn sent(&self, guild: GuildId, sender: UserId) -> &[(UserId, NaiveDate)] {
        self.0
            .get(&guild)
            .and_then(|senders| senders.get(&sender))
            .map_or(&[], Vec::as_slice)
    }

    pub fn sent_mut(&mut self, guild: GuildId, sender: UserId) -> &mut Vec<(UserId, NaiveDate)> {
        self.0.entry(guild).or_default().entry(sender).or_default()
    }
}

/// `{guildId: {userId: score}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard(pub IndexMap<GuildId, IndexMap<UserId, u32>>);

impl Document for Leaderboard {
    const FILE: &'static str = "rocket_leaderboard.json";
}

impl Leaderboard {
    #[must_use]
    pub fn score(&self, guild: GuildId, user: UserId) -> u32 {
        self.0
            .get(&guild)
            .and_then(|scores| scores.get(&user))
            .copied()
            .unwrap_or_default()
    }

    pub fn score_mut(&mut self, guild: GuildId, user: UserId) -> &mut u32 {
        self.0.entry(guild).or_default().entry(user).or_default()
    }
}

/// One dating outcome as seen by one party.
///
/// Stored as `[otherUserId, matched]` or `[otherUserId, matched, reason]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub other: UserId,
    pub matched: bool,
    pub reason: Option<String>,
}

impl Serialize for HistoryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reason = self.reason.as_deref().filter(|r| !r.is_empty());
        let mut tuple = serializer.serialize_tuple(if reason.is_some() { 3 } else { 2 })?;
        tuple.serialize_element(&self.other)?;
        tuple.serialize_element(&self.matched)?;
        if let Some(reason) = reason {
            tuple.serialize_element(reason)?;
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for HistoryRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            WithReason(UserId, bool, Option<String>),
            Bare(UserId, bool),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::WithReason(other, matched, reason) => Self {
                other,
                matched,
                reason: reason.filter(|r| !r.is_empty()),
            },
            Raw::Bare(other, matched) => Self {
                other,
                matched,
                reason: None,
            },
        })
    }
}

/// `{guildId: {userId: [HistoryRecord, ...]}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(pub IndexMap<GuildId, IndexMap<UserId, Vec<HistoryRecord>>>);

impl Document for History {
    const FILE: &'static str = "rocket_history.json";
}

impl History {
    #[must_use]
    pub fn records(&self, guild: GuildId, user: UserId) -> &[HistoryRecord] {
        self.0
            .get(&guild)
            .and_then(|users| users.get(&user))
            .map_or(&[], Vec::as_slice)
    }

    pub fn push(&mut self, guild: GuildId, user: UserId, record: HistoryRecord) {
        self.0
            .entry(guild)
            .or_default()
            .entry(user)
            .or_default()
            .push(record);
    }
}

/// Whether the confessor chose to reveal their name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "yes")]
    Public,
    #[serde(rename = "no")]
    Anonymous,
}

/// A camper's reaction to the confession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampfireReaction {
    pub user_id: UserId,
    pub emoji: String,
}

/// Today's campfire of one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampfireRecord {
    #[serde(default)]
    pub campers: Vec<UserId>,
    #[serde(default)]
    pub starter_camper: Option<UserId>,
    #[serde(default)]
    pub chosen_camper: Option<UserId>,
    #[serde(default)]
    pub confession_message: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub reactions: Vec<CampfireReaction>,
    #[serde(default, rename = "isPublic")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub thread_id: Option<ChannelId>,
    #[serde(default)]
    pub starter_camper_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub last_reset: Option<NaiveDate>,
    #[serde(default)]
    pub confession_msg_id: Option<MessageId>,
    /// Camper who confessed; kept so public confessions can be attributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confessor: Option<UserId>,
}

impl CampfireRecord {
    /// Whether the record holds a confession made on `today`.
    #[must_use]
    pub fn confessed_on(&self, today: NaiveDate) -> bool {
        self.last_reset == Some(today) && self.confession_message.is_some()
    }
}

/// `{guildId: CampfireRecord}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Campfires(pub IndexMap<GuildId, CampfireRecord>);

impl Document for Campfires {
    const FILE: &'static str = "rocket_campfire.json";
}

/// Catalog id of a Pokémon; older catalogs use numbers, newer ones names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PokemonKey {
    Number(u64),
    Name(String),
}

impl fmt::Display for PokemonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    #[serde(default)]
    pub win: u32,
    #[serde(default)]
    pub loss: u32,
}

/// A user's pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub rocket_pokemon: PokemonKey,
    pub name: String,
    #[serde(default = "first_level")]
    pub level: u8,
    #[serde(default)]
    pub walks: u32,
    #[serde(default)]
    pub feeds: u32,
    #[serde(default)]
    pub battle: BattleRecord,
    pub asset: String,
    pub evolution_asset: String,
}

const fn first_level() -> u8 {
    1
}

/// `{userId: Pet}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PokemonOwners(pub IndexMap<UserId, Pet>);

impl Document for PokemonOwners {
    const FILE: &'static str = "rocket_pokemon_owners.json";
}

/// Who may read a MyDay entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyDayEntry {
    pub message: String,
    #[serde(default)]
    pub privacy: Privacy,
}

/// One day of MyDay in one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyDayRound {
    pub chosen: Vec<UserId>,
    #[serde(default)]
    pub entries: IndexMap<UserId, MyDayEntry>,
}

/// `{guildId: {"YYYY-MM-DD": MyDayRound}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MyDays(pub IndexMap<GuildId, IndexMap<NaiveDate, MyDayRound>>);

impl Document for MyDays {
    const FILE: &'static str = "rocket_myday.json";
}

impl MyDays {
    #[must_use]
    pub fn round(&self, guild: GuildId, day: NaiveDate) -> Option<&MyDayRound> {
        self.0.get(&guild).and_then(|days| days.get(&day))
    }
}

/// `{channelId: [allowedCommand, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadRestrictions(pub IndexMap<ChannelId, Vec<String>>);

impl Document for ThreadRestrictions {
    const FILE: &'static str = "rocket_thread_restriction.json";
}
