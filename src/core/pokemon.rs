//! Pokémon pet game.
//!
//! Every user may own one pet. Walking, feeding and winning battles raise its
//! level; at the top level the pet shows its evolved form.

use crate::{
    core::ids::UserId,
    errors::{Error, Result},
    store::{JsonStore, Pet, PokemonKey, PokemonOwners},
};
use rand::{Rng, seq::SliceRandom};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Name of a pet that was never given one.
pub const UNNAMED: &str = "UNKNOWN";
/// Counter value at which an activity stops adding to the level.
pub const ACTIVITY_CAP: u32 = 5;
/// Level at which the evolution asset is shown.
pub const MAX_LEVEL: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeciesAssets {
    pub main: String,
    pub evolution: String,
    #[serde(default)]
    pub walking: Option<String>,
    #[serde(default)]
    pub battling: Option<String>,
    #[serde(default)]
    pub feeding: Option<String>,
}

/// Catalog entry of a catchable Pokémon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Species {
    pub id: PokemonKey,
    pub name: String,
    pub asset: SpeciesAssets,
}

/// Level from the capped activity counters.
///
/// Each of walks, feeds and wins counts up to [`ACTIVITY_CAP`]; their average
/// share of the cap, scaled to five levels and rounded, is clamped to 1..=5.
#[must_use]
pub fn pet_level(pet: &Pet) -> u8 {
    let progress = pet.walks.min(ACTIVITY_CAP) + pet.feeds.min(ACTIVITY_CAP) + pet.battle.win.min(ACTIVITY_CAP);
    // round(progress / 15 * 5) == round(progress / 3); thirds never tie.
    let level = (progress + 1) / 3;
    u8::try_from(level).unwrap_or(MAX_LEVEL).clamp(1, MAX_LEVEL)
}

/// A pet together with its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetView {
    pub pet: Pet,
    pub species: Species,
}

impl PetView {
    /// Nickname, or the species name while unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.pet.name == UNNAMED {
            &self.species.name
        } else {
            &self.pet.name
        }
    }

    /// Asset matching the pet's level.
    #[must_use]
    pub fn current_asset(&self) -> &str {
        if self.pet.level >= MAX_LEVEL {
            &self.pet.evolution_asset
        } else {
            &self.pet.asset
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleResult {
    Win,
    Loss,
}

/// Activity that bumps a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Walk,
    Feed,
    Battle(BattleResult),
}

/// Pet game service.
#[derive(Debug, Clone)]
pub struct PokemonGame {
    store: JsonStore,
    catalog: Arc<Vec<Species>>,
}

impl PokemonGame {
    #[must_use]
    pub fn new(store: JsonStore, catalog: Vec<Species>) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
        }
    }

    fn species(&self, key: &PokemonKey) -> Result<Species> {
        self.catalog
            .iter()
            .find(|species| &species.id == key)
            .cloned()
            .ok_or_else(|| Error::AssetMissing {
                what: format!("Pokémon data for `{key}`"),
            })
    }

    /// Catches a random Pokémon for `user`.
    #[instrument(skip(self, rng))]
    pub async fn catch(&self, user: UserId, rng: &mut (impl Rng + Send)) -> Result<PetView> {
        let catalog = Arc::clone(&self.catalog);
        let view = self
            .store
            .update::<PokemonOwners, _, _>(|owners| {
                if owners.0.contains_key(&user) {
                    return Err(Error::AlreadyOwnsPet);
                }
                let species = catalog.choose(rng).ok_or(Error::NoPokemonAvailable)?.clone();
                let pet = Pet {
                    rocket_pokemon: species.id.clone(),
                    name: UNNAMED.to_string(),
                    level: 1,
                    walks: 0,
                    feeds: 0,
                    battle: crate::store::BattleRecord::default(),
                    asset: species.asset.main.clone(),
                    evolution_asset: species.asset.evolution.clone(),
                };
                owners.0.insert(user, pet.clone());
                Ok(PetView { pet, species })
            })
            .await?;
        info!(species = %view.species.name, "pokemon caught");
        Ok(view)
    }

    /// Gives the pet of `user` a nickname.
    pub async fn rename(&self, user: UserId, nickname: &str) -> Result<()> {
        self.store
            .update::<PokemonOwners, _, _>(|owners| {
                let pet = owners.0.get_mut(&user).ok_or(Error::NoPet)?;
                nickname.trim().clone_into(&mut pet.name);
                Ok(())
            })
            .await
    }

    /// Shows the pet of `user`, refreshing its stored level.
    pub async fn show(&self, user: UserId) -> Result<PetView> {
        self.store
            .update::<PokemonOwners, _, _>(|owners| {
                let pet = owners.0.get_mut(&user).ok_or(Error::NoPet)?;
                let species = self.species(&pet.rocket_pokemon)?;
                pet.level = pet_level(pet);
                Ok(PetView {
                    pet: pet.clone(),
                    species,
                })
            })
            .await
    }

    async fn train(&self, user: UserId, activity: Activity) -> Result<PetView> {
        self.store
            .update::<PokemonOwners, _, _>(|owners| {
                let pet = owners.0.get_mut(&user).ok_or(Error::NoPet)?;
                let species = self.species(&pet.rocket_pokemon)?;
                match activity {
                    Activity::Walk => pet.walks += 1,
                    Activity::Feed => pet.feeds += 1,
                    Activity::Battle(BattleResult::Win) => pet.battle.win += 1,
                    Activity::Battle(BattleResult::Loss) => pet.battle.loss += 1,
                }
                Ok(PetView {
                    pet: pet.clone(),
                    species,
                })
            })
            .await
    }

    pub async fn walk(&self, user: UserId) -> Result<PetView> {
        self.train(user, Activity::Walk).await
    }

    pub async fn feed(&self, user: UserId) -> Result<PetView> {
        self.train(user, Activity::Feed).await
    }

    /// Fights a random battle; a coin flip decides the result.
    pub async fn battle(&self, user: UserId, rng: &mut impl Rng) -> Result<(PetView, BattleResult)> {
        let result = if rng.gen_bool(0.5) {
            BattleResult::Win
        } else {
            BattleResult::Loss
        };
        let view = self.train(user, Activity::Battle(result)).await?;
        Ok((view, result))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        store::BattleRecord,
        test_utils::{sample_species, temp_store},
    };
    use rand::{SeedableRng, rngs::StdRng};

    const TRAINER: UserId = UserId::new(42);

    fn pet_with(walks: u32, feeds: u32, wins: u32) -> Pet {
        Pet {
            rocket_pokemon: PokemonKey::Number(52),
            name: UNNAMED.to_string(),
            level: 1,
            walks,
            feeds,
            battle: BattleRecord { win: wins, loss: 0 },
            asset: "meowth.gif".to_string(),
            evolution_asset: "persian.gif".to_string(),
        }
    }

    #[test]
    fn test_level_formula() {
        assert_eq!(pet_level(&pet_with(0, 0, 0)), 1);
        assert_eq!(pet_level(&pet_with(1, 0, 0)), 1);
        // 5 of 15: round(1.67) = 2
        assert_eq!(pet_level(&pet_with(5, 0, 0)), 2);
        // 7 of 15: round(2.33) = 2
        assert_eq!(pet_level(&pet_with(5, 2, 0)), 2);
        // 8 of 15: round(2.67) = 3
        assert_eq!(pet_level(&pet_with(5, 3, 0)), 3);
        assert_eq!(pet_level(&pet_with(5, 5, 4)), 5);
        // Counters past the cap do not help.
        assert_eq!(pet_level(&pet_with(50, 0, 0)), 2);
    }

    #[tokio::test]
    async fn test_catch_once() -> Result<()> {
        let (_dir, store) = temp_store();
        let game = PokemonGame::new(store, vec![sample_species()]);
        let mut rng = StdRng::seed_from_u64(1);

        let view = game.catch(TRAINER, &mut rng).await?;
        assert_eq!(view.pet.name, UNNAMED);
        assert_eq!(view.pet.level, 1);
        assert_eq!(view.display_name(), "Meowth");

        let again = game.catch(TRAINER, &mut rng).await;
        assert!(matches!(again, Err(Error::AlreadyOwnsPet)));
        Ok(())
    }

    #[tokio::test]
    async fn test_catch_with_empty_catalog() {
        let (_dir, store) = temp_store();
        let game = PokemonGame::new(store, Vec::new());
        let result = game.catch(TRAINER, &mut StdRng::seed_from_u64(1)).await;
        assert!(matches!(result, Err(Error::NoPokemonAvailable)));
    }

    #[tokio::test]
    async fn test_actions_need_a_pet() {
        let (_dir, store) = temp_store();
        let game = PokemonGame::new(store, vec![sample_species()]);
        assert!(matches!(game.walk(TRAINER).await, Err(Error::NoPet)));
        assert!(matches!(game.rename(TRAINER, "Rocky").await, Err(Error::NoPet)));
        assert!(matches!(game.show(TRAINER).await, Err(Error::NoPet)));
    }

    #[tokio::test]
    async fn test_training_levels_up_and_evolves() -> Result<()> {
        let (_dir, store) = temp_store();
        let game = PokemonGame::new(store, vec![sample_species()]);
        game.catch(TRAINER, &mut StdRng::seed_from_u64(1)).await?;
        game.rename(TRAINER, "Rocky").await?;

        for _ in 0..5 {
            game.walk(TRAINER).await?;
            game.feed(TRAINER).await?;
        }
        let view = game.show(TRAINER).await?;
        assert_eq!(view.pet.level, 3);
        assert_eq!(view.display_name(), "Rocky");
        assert_eq!(view.current_asset(), "meowth.gif");

        let mut rng = StdRng::seed_from_u64(9);
        let mut wins = 0;
        while wins < 5 {
            let (_, result) = game.battle(TRAINER, &mut rng).await?;
            if result == BattleResult::Win {
                wins += 1;
            }
        }
        let view = game.show(TRAINER).await?;
        assert_eq!(view.pet.level, MAX_LEVEL);
        assert_eq!(view.current_asset(), "persian.gif");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_catalog_entry_is_reported() -> Result<()> {
        let (_dir, store) = temp_store();
        PokemonGame::new(store.clone(), vec![sample_species()])
            .catch(TRAINER, &mut StdRng::seed_from_u64(1))
            .await?;

        let game = PokemonGame::new(store, Vec::new());
        assert!(matches!(game.show(TRAINER).await, Err(Error::AssetMissing { .. })));
        assert!(matches!(game.feed(TRAINER).await, Err(Error::AssetMissing { .. })));
        Ok(())
    }
}
