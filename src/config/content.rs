//! Game content catalogs stored as JSON next to the data documents.
//!
//! Catalogs are read once at start-up. A missing file yields an empty catalog
//! and the affected game answers with a "no content" message.

use crate::{
    core::{personality::PersonalityTest, pokemon::Species},
    errors::{Error, Result},
};
use serde::{Deserialize, de::DeserializeOwned};
use std::path::Path;
use tracing::{info, warn};

pub const PERSONALITY_TESTS_FILE: &str = "rocket_personality_test.json";
pub const POKEMON_LIST_FILE: &str = "rocket_pokemon_list.json";
pub const DRAWING_COMPLIMENTS_FILE: &str = "rocket_drawing_compliments.json";

/// Everything loaded from the catalogs.
#[derive(Debug, Clone, Default)]
pub struct GameContent {
    pub personality_tests: Vec<PersonalityTest>,
    pub pokemon: Vec<Species>,
    pub compliments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Compliments {
    #[serde(default)]
    compliments: Vec<String>,
}

fn load_catalog<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Content catalog {:?} not found, using an empty one", path);
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse content catalog {file}: {e}"),
    })
}

/// Loads every catalog from `dir`.
///
/// # Errors
/// Returns [`Error::Config`] when a catalog exists but is malformed.
pub fn load_content(dir: &Path) -> Result<GameContent> {
    let personality_tests: Vec<PersonalityTest> = load_catalog(dir, PERSONALITY_TESTS_FILE)?;
    let pokemon: Vec<Species> = load_catalog(dir, POKEMON_LIST_FILE)?;
    let compliments: Compliments = load_catalog(dir, DRAWING_COMPLIMENTS_FILE)?;

    info!(
        tests = personality_tests.len(),
        pokemon = pokemon.len(),
        compliments = compliments.compliments.len(),
        "Loaded game content"
    );
    Ok(GameContent {
        personality_tests,
        pokemon,
        compliments: compliments.compliments,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::PokemonKey;

    #[test]
    fn test_missing_catalogs_are_empty() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let content = load_content(dir.path())?;
        assert!(content.personality_tests.is_empty());
        assert!(content.pokemon.is_empty());
        assert!(content.compliments.is_empty());
        Ok(())
    }

    #[test]
    fn test_catalogs_are_parsed() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(POKEMON_LIST_FILE),
            r#"[
                {"id": 52, "name": "Meowth", "asset": {"main": "meowth.gif", "evolution": "persian.gif"}},
                {"id": "ekans", "name": "Ekans", "asset": {"main": "ekans.gif", "evolution": "arbok.gif", "walking": "ekans_walk.gif"}}
            ]"#,
        )?;
        std::fs::write(
            dir.path().join(PERSONALITY_TESTS_FILE),
            r#"[{
                "title": "Which Rocket are you?",
                "steps": [{"text": "Pick one", "choices": [{"label": "Roses", "points": {"James": 2}}]}],
                "final_result": {"James": "Dramatic and proud."}
            }]"#,
        )?;
        std::fs::write(
            dir.path().join(DRAWING_COMPLIMENTS_FILE),
            r#"{"compliments": ["Masterpiece!", "So cute!"]}"#,
        )?;

        let content = load_content(dir.path())?;
        assert_eq!(content.pokemon.len(), 2);
        assert_eq!(content.pokemon[0].id, PokemonKey::Number(52));
        assert_eq!(content.pokemon[1].asset.walking.as_deref(), Some("ekans_walk.gif"));
        assert_eq!(content.personality_tests[0].steps[0].choices[0].points["James"], 2);
        assert_eq!(content.compliments, vec!["Masterpiece!", "So cute!"]);
        Ok(())
    }

    #[test]
    fn test_malformed_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(POKEMON_LIST_FILE), "{ not json").unwrap();
        assert!(matches!(load_content(dir.path()), Err(Error::Config { .. })));
    }
}
