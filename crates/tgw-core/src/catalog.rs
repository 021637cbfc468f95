//! Fixed lookup tables: the closed emotion vocabulary and the persona catalog.
//!
//! Both are built once at startup and shared read-only through the
//! [`AnalysisContext`](crate::context::AnalysisContext).

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

pub const EMOTIONS: &[&str] = &[
    "chaotic energy",
    "unhinged",
    "main character vibes",
    "villain arc",
    "cozy",
    "wholesome",
    "salty",
    "dramatic",
    "hype",
    "nostalgic",
    "simp mode",
    "down bad",
    "existential crisis",
    "flirty",
    "petty",
];

pub const DEFAULT_PERSONA_ID: &str = "jake";

/// Normalize a raw emotion label and accept it only if it is in the vocabulary.
pub fn canonical_emotion(raw: &str) -> Option<&'static str> {
    let v = strip_decoration(raw).to_lowercase();
    let v = v.split_whitespace().collect::<Vec<_>>().join(" ");
    EMOTIONS.iter().copied().find(|e| *e == v)
}

/// Strip the brackets, quotes and emphasis models like to wrap values in.
pub(crate) fn strip_decoration(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'' | '*' | '`' | '.'))
        .trim()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub show: String,
    pub traits: String,
}

/// Read-only persona table keyed by stable id.
#[derive(Clone, Debug)]
pub struct PersonaCatalog {
    personas: BTreeMap<String, Persona>,
    default_id: String,
}

impl PersonaCatalog {
    pub fn builtin() -> Self {
        const BUILTIN: &[(&str, &str, &str, &str)] = &[
            (
                "rick",
                "Rick Sanchez",
                "Rick and Morty",
                "chaotic genius, nihilistic, unhinged, sarcastic, secretly caring",
            ),
            (
                "morty",
                "Morty Smith",
                "Rick and Morty",
                "anxious, wholesome, simp tendencies, easily stressed, loyal",
            ),
            (
                "patrick",
                "Patrick Star",
                "SpongeBob",
                "chaotic energy, clueless, wholesome, unintentionally funny",
            ),
            (
                "squidward",
                "Squidward Tentacles",
                "SpongeBob",
                "salty, dramatic, existential crisis, pretentious, tired",
            ),
            (
                "jake",
                "Jake the Dog",
                "Adventure Time",
                "cozy, chill vibes, wise but lazy, supportive bestie",
            ),
            (
                "finn",
                "Finn the Human",
                "Adventure Time",
                "main character energy, hype, romantic, heroic, emotional",
            ),
            (
                "bmo",
                "BMO",
                "Adventure Time",
                "wholesome, chaotic innocent, playful, secretly deep",
            ),
            (
                "bojack",
                "BoJack Horseman",
                "BoJack Horseman",
                "existential crisis, dramatic, self-destructive, nostalgic, deep",
            ),
            (
                "princess_carolyn",
                "Princess Carolyn",
                "BoJack Horseman",
                "main character vibes, hustler, dramatic, resilient, workaholic",
            ),
            (
                "tina",
                "Tina Belcher",
                "Bob's Burgers",
                "down bad, simp mode, awkward, confident, romantic fantasies",
            ),
            (
                "louise",
                "Louise Belcher",
                "Bob's Burgers",
                "villain arc, chaotic, petty, scheming, secretly wholesome",
            ),
            (
                "aang",
                "Aang",
                "Avatar: The Last Airbender",
                "wholesome, hype, playful, avoids conflict, main character",
            ),
            (
                "zuko",
                "Zuko",
                "Avatar: The Last Airbender",
                "dramatic, redemption arc, angsty, honor-obsessed, growth",
            ),
            (
                "shrek",
                "Shrek",
                "Shrek",
                "salty, protective of peace, secretly wholesome, grumpy exterior",
            ),
            (
                "gumball",
                "Gumball Watterson",
                "Amazing World of Gumball",
                "chaotic energy, unhinged, dramatic, main character delusion",
            ),
        ];

        let personas = BUILTIN
            .iter()
            .map(|(id, name, show, traits)| {
                (
                    id.to_string(),
                    Persona {
                        id: id.to_string(),
                        name: name.to_string(),
                        show: show.to_string(),
                        traits: traits.to_string(),
                    },
                )
            })
            .collect();

        Self {
            personas,
            default_id: DEFAULT_PERSONA_ID.to_string(),
        }
    }

    /// Build a catalog from a list; the default id must be present.
    pub fn from_personas(personas: Vec<Persona>, default_id: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        for p in personas {
            let id = normalize_id(&p.id);
            if id.is_empty() {
                return Err(Error::Config("persona with empty id".to_string()));
            }
            if map.insert(id.clone(), Persona { id, ..p }).is_some() {
                return Err(Error::Config("duplicate persona id in catalog".to_string()));
            }
        }

        let default_id = normalize_id(default_id);
        if !map.contains_key(&default_id) {
            return Err(Error::Config(format!(
                "persona catalog is missing default persona `{default_id}`"
            )));
        }

        Ok(Self {
            personas: map,
            default_id,
        })
    }

    /// Load a JSON array of personas. The built-in default id must be present.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let personas: Vec<Persona> = serde_json::from_str(&raw)?;
        Self::from_personas(personas, DEFAULT_PERSONA_ID)
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// Look up an id as an oracle might spell it (`Princess Carolyn`, `[JAKE]`),
    /// falling back to a display-name match (`Jake the Dog`).
    pub fn resolve(&self, raw: &str) -> Option<&Persona> {
        let id = normalize_id(raw);
        if id.is_empty() {
            return None;
        }
        self.personas.get(&id).or_else(|| {
            self.personas
                .values()
                .find(|p| normalize_id(&p.name) == id)
        })
    }

    pub fn default_persona(&self) -> &Persona {
        // Presence is checked at construction.
        &self.personas[&self.default_id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_id(raw: &str) -> String {
    strip_decoration(raw)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
