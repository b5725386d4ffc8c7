//! Shared test utilities for `RocketBot`.
//!
//! Helpers for setting up throwaway stores and building game content with
//! sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        ids::{GuildId, UserId},
        personality::{Choice, PersonalityTest, Step},
        pokemon::{Species, SpeciesAssets},
    },
    store::{Contestant, Contestants, JsonStore, PokemonKey},
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use tempfile::TempDir;

/// Creates a store in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn temp_store() -> (TempDir, JsonStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path());
    (dir, store)
}

/// A day of January 2024.
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

/// Registers `users` as contestants of `guild`, named after their ids.
pub async fn register_all(store: &JsonStore, guild: GuildId, users: &[UserId]) {
    store
        .update::<Contestants, _, _>(|contestants| {
            let registered = contestants.0.entry(guild).or_default();
            for &user in users {
                registered.insert(
                    user,
                    Contestant {
                        name: format!("user{user}"),
                        gender: "?".to_string(),
                        registered_at: Some(day(1)),
                    },
                );
            }
            Ok(())
        })
        .await
        .unwrap();
}

fn choice(label: &str, category: &str, points: i32) -> Choice {
    let mut map = IndexMap::new();
    map.insert(category.to_string(), points);
    Choice {
        label: label.to_string(),
        points: map,
    }
}

/// Two-step test; the first option scores for Jessie, the second for James.
pub fn sample_personality_test(title: &str) -> PersonalityTest {
    let steps = ["Pick a flower", "Pick a motto"]
        .into_iter()
        .map(|text| Step {
            text: text.to_string(),
            choices: vec![choice("Rose", "Jessie", 2), choice("Lily", "James", 2)],
        })
        .collect();

    let mut final_result = IndexMap::new();
    final_result.insert("Jessie".to_string(), "Fierce and glamorous.".to_string());
    final_result.insert("James".to_string(), "Dramatic and proud.".to_string());

    PersonalityTest {
        title: title.to_string(),
        description: format!("{title} test"),
        steps,
        final_result,
    }
}

/// Meowth, evolving into Persian.
pub fn sample_species() -> Species {
    Species {
        id: PokemonKey::Number(52),
        name: "Meowth".to_string(),
        asset: SpeciesAssets {
            main: "meowth.gif".to_string(),
            evolution: "persian.gif".to_string(),
            walking: None,
            battling: None,
            feeding: None,
        },
    }
}
