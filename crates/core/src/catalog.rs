use crate::difficulty::{DifficultyLevel, Tiered};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SoundCategory {
    Animal,
    Household,
    Nature,
    Musical,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoundItem {
    pub id: String,
    pub display_name: String,
    pub category: SoundCategory,
    pub description: String,
    pub difficulty: DifficultyLevel,
}

impl Tiered for SoundItem {
    fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }
}

/// A clap pattern; each step is `1` (clap) or `0` (rest).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RhythmPattern {
    pub id: String,
    pub name: String,
    pub pattern: Vec<u8>,
    pub difficulty: DifficultyLevel,
    pub description: String,
}

impl RhythmPattern {
    pub fn beat_count(&self) -> u32 {
        self.pattern.iter().filter(|b| **b == 1).count() as u32
    }
}

impl Tiered for RhythmPattern {
    fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentCatalog {
    pub discovery_sounds: Vec<SoundItem>,
    pub animal_sounds: Vec<SoundItem>,
    pub rhythm_patterns: Vec<RhythmPattern>,
}

impl ContentCatalog {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn find_sound(&self, id: &str) -> Option<&SoundItem> {
        self.discovery_sounds
            .iter()
            .chain(&self.animal_sounds)
            .find(|s| s.id == id)
    }
}

fn sound(
    id: &str,
    display_name: &str,
    category: SoundCategory,
    description: &str,
    difficulty: DifficultyLevel,
) -> SoundItem {
    SoundItem {
        id: id.to_owned(),
        display_name: display_name.to_owned(),
        category,
        description: description.to_owned(),
        difficulty,
    }
}

fn rhythm(
    id: &str,
    name: &str,
    pattern: &[u8],
    difficulty: DifficultyLevel,
    description: &str,
) -> RhythmPattern {
    RhythmPattern {
        id: id.to_owned(),
        name: name.to_owned(),
        pattern: pattern.to_vec(),
        difficulty,
        description: description.to_owned(),
    }
}

impl Default for ContentCatalog {
    fn default() -> Self {
        use DifficultyLevel::{Easy, Hard, Medium};
        use SoundCategory::{Animal, Household, Nature};

        let discovery_sounds = vec![
            sound("clock-tick", "Tick-Tock Clock", Household, "The gentle ticking of a clock", Easy),
            sound("fridge-hum", "Humming Refrigerator", Household, "The low hum of the fridge", Medium),
            sound("water-drip", "Dripping Water", Household, "Drip... drip... drip...", Easy),
            sound("wind-blow", "Gentle Wind", Nature, "Whoooosh goes the wind", Easy),
            sound("bird-chirp", "Bird Chirping", Nature, "Tweet tweet from a little bird", Easy),
            sound("door-creak", "Creaky Door", Household, "Creeeak! The door opens", Easy),
            sound("rain-patter", "Rain Drops", Nature, "Pitter patter on the window", Easy),
            sound("phone-ring", "Phone Ringing", Household, "Ring ring! Time to answer", Easy),
        ];

        let animal_sounds = vec![
            sound("lion-roar", "Lion", Animal, "ROOOAAAR! The mighty lion!", Easy),
            sound("elephant-trumpet", "Elephant", Animal, "PAAA-OOOOO! The elephant says hello!", Medium),
            sound("monkey-chatter", "Monkey", Animal, "Ooh ooh ah ah! The silly monkey!", Easy),
            sound("snake-hiss", "Snake", Animal, "Sssssss... says the snake", Easy),
            sound("mouse-squeak", "Mouse", Animal, "Squeak squeak! The tiny mouse", Easy),
            sound("bear-growl", "Bear", Animal, "GRRRRR! The big bear!", Medium),
            sound("owl-hoot", "Owl", Animal, "Hoo hoo! The wise owl", Medium),
            sound("frog-ribbit", "Frog", Animal, "Ribbit ribbit! The jumping frog", Easy),
            sound("cat-meow", "Cat", Animal, "Meow meow! The cuddly cat", Easy),
            sound("dog-bark", "Dog", Animal, "Woof woof! The friendly dog", Easy),
            sound("bird-tweet", "Bird", Animal, "Tweet tweet! The singing bird", Easy),
            sound("bee-buzz", "Bee", Animal, "Bzzzzz! The busy bee", Easy),
            sound("duck-quack", "Duck", Animal, "Quack quack! The swimming duck", Easy),
            sound("horse-neigh", "Horse", Animal, "Neeeigh! The galloping horse", Medium),
            sound("sheep-baa", "Sheep", Animal, "Baa baa! The fluffy sheep", Easy),
            sound("pig-oink", "Pig", Animal, "Oink oink! The happy pig", Easy),
        ];

        let rhythm_patterns = vec![
            rhythm("simple-beat", "Simple Beat", &[1, 0, 1, 0], Easy, "Clap... rest... clap... rest"),
            rhythm("double-clap", "Double Clap", &[1, 1, 0, 0], Easy, "Clap clap... pause... clap clap"),
            rhythm("triple-fun", "Triple Fun", &[1, 1, 1, 0], Medium, "Clap clap clap... pause"),
            rhythm("syncopated", "Bouncy Beat", &[1, 0, 1, 1], Hard, "Clap... rest... clap clap"),
            rhythm("gallop", "Galloping Horse", &[1, 1, 0, 1], Medium, "Clap clap... rest... clap"),
            rhythm("heartbeat", "Heartbeat", &[1, 1, 0, 0, 1, 1, 0, 0], Medium, "Boom boom... boom boom"),
        ];

        Self {
            discovery_sounds,
            animal_sounds,
            rhythm_patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::filter_by_difficulty;

    #[test]
    fn default_catalog_sizes() {
        let c = ContentCatalog::default();
        assert_eq!(c.discovery_sounds.len(), 8);
        assert_eq!(c.animal_sounds.len(), 16);
        assert_eq!(c.rhythm_patterns.len(), 6);
    }

    #[test]
    fn beat_count_counts_claps() {
        let c = ContentCatalog::default();
        let counts: Vec<u32> = c.rhythm_patterns.iter().map(|p| p.beat_count()).collect();
        assert_eq!(counts, vec![2, 2, 3, 3, 3, 4]);
    }

    #[test]
    fn easy_tier_excludes_harder_content() {
        let c = ContentCatalog::default();
        let easy = filter_by_difficulty(&c.rhythm_patterns, DifficultyLevel::Easy);
        let ids: Vec<&str> = easy.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["simple-beat", "double-clap"]);
        assert_eq!(filter_by_difficulty(&c.animal_sounds, DifficultyLevel::Easy).len(), 12);
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let c = ContentCatalog::default();
        let json = serde_json::to_string(&c).expect("serialize");
        assert_eq!(ContentCatalog::from_json(&json).expect("deserialize"), c);
    }

    #[test]
    fn find_sound_searches_both_lists() {
        let c = ContentCatalog::default();
        assert_eq!(c.find_sound("owl-hoot").map(|s| s.display_name.as_str()), Some("Owl"));
        assert_eq!(c.find_sound("rain-patter").map(|s| s.category), Some(SoundCategory::Nature));
        assert!(c.find_sound("unicorn").is_none());
    }
}
