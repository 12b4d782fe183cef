use crate::detect::Gender;
use serde::Serialize;
use std::collections::HashMap;

/// Reserved speaker key for any text not attributed to a detected character.
pub const NARRATOR_KEY: &str = "narrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderClass {
    Male,
    Female,
    Child,
    Elder,
}

/// Immutable synthesis descriptor for one catalog voice. Pitch, rate and
/// volume are nominal here; they are clamped to engine ranges at synthesis
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub name: &'static str,
    pub gender: GenderClass,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_hint: Option<&'static str>,
}

pub const MALE_HERO: VoiceProfile = VoiceProfile {
    name: "Male Hero",
    gender: GenderClass::Male,
    pitch: 0.8,
    rate: 0.9,
    volume: 1.0,
    voice_hint: Some("male"),
};

pub const MALE_VILLAIN: VoiceProfile = VoiceProfile {
    name: "Male Villain",
    gender: GenderClass::Male,
    pitch: 0.6,
    rate: 0.8,
    volume: 1.0,
    voice_hint: Some("male"),
};

pub const MALE_WISE: VoiceProfile = VoiceProfile {
    name: "Wise Male",
    gender: GenderClass::Male,
    pitch: 0.7,
    rate: 0.8,
    volume: 0.9,
    voice_hint: Some("male"),
};

pub const MALE_YOUNG: VoiceProfile = VoiceProfile {
    name: "Young Male",
    gender: GenderClass::Male,
    pitch: 1.0,
    rate: 1.0,
    volume: 1.0,
    voice_hint: Some("male"),
};

pub const FEMALE_HEROINE: VoiceProfile = VoiceProfile {
    name: "Female Heroine",
    gender: GenderClass::Female,
    pitch: 1.2,
    rate: 0.9,
    volume: 1.0,
    voice_hint: Some("female"),
};

pub const FEMALE_VILLAINESS: VoiceProfile = VoiceProfile {
    name: "Female Villainess",
    gender: GenderClass::Female,
    pitch: 1.0,
    rate: 0.8,
    volume: 1.0,
    voice_hint: Some("female"),
};

pub const FEMALE_WISE: VoiceProfile = VoiceProfile {
    name: "Wise Female",
    gender: GenderClass::Female,
    pitch: 1.1,
    rate: 0.8,
    volume: 0.9,
    voice_hint: Some("female"),
};

pub const FEMALE_YOUNG: VoiceProfile = VoiceProfile {
    name: "Young Female",
    gender: GenderClass::Female,
    pitch: 1.3,
    rate: 1.0,
    volume: 1.0,
    voice_hint: Some("female"),
};

pub const GRANDMOTHER: VoiceProfile = VoiceProfile {
    name: "Grandmother",
    gender: GenderClass::Elder,
    pitch: 1.1,
    rate: 0.7,
    volume: 0.9,
    voice_hint: Some("female"),
};

pub const MOTHER: VoiceProfile = VoiceProfile {
    name: "Mother",
    gender: GenderClass::Female,
    pitch: 1.2,
    rate: 0.8,
    volume: 1.0,
    voice_hint: Some("female"),
};

pub const NARRATOR: VoiceProfile = VoiceProfile {
    name: "Narrator",
    gender: GenderClass::Female,
    pitch: 1.0,
    rate: 0.9,
    volume: 0.9,
    voice_hint: Some("female"),
};

// Assignment priority within each gender class.
const MALE_POOL: [VoiceProfile; 4] = [MALE_HERO, MALE_VILLAIN, MALE_WISE, MALE_YOUNG];
const FEMALE_POOL: [VoiceProfile; 4] = [FEMALE_HEROINE, FEMALE_VILLAINESS, FEMALE_WISE, FEMALE_YOUNG];

/// One character's resolved voice, as shown in the character-voices panel.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterVoice {
    pub character_name: String,
    pub voice: VoiceProfile,
    pub is_narrator: bool,
}

/// Character-to-voice assignments for one story-reading session. Keys are
/// lowercased character names; the narrator entry is always present after
/// `reset`. Detection order is preserved, since attribution scans the cast
/// in that order. Rebuilt from scratch on every story analysis, so nothing
/// leaks across stories.
#[derive(Debug, Default)]
pub struct VoiceMap {
    entries: HashMap<String, CharacterVoice>,
    order: Vec<String>,
}

impl VoiceMap {
    pub fn new() -> Self {
        let mut map = Self::default();
        map.reset();
        map
    }

    /// Clears all assignments and reinstalls the reserved narrator entry.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.order.push(NARRATOR_KEY.to_string());
        self.entries.insert(
            NARRATOR_KEY.to_string(),
            CharacterVoice {
                character_name: NARRATOR_KEY.to_string(),
                voice: NARRATOR,
                is_narrator: true,
            },
        );
    }

    pub fn insert(&mut self, name: &str, voice: VoiceProfile) {
        let key = name.to_lowercase();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(
            key,
            CharacterVoice {
                character_name: name.to_string(),
                voice,
                is_narrator: false,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn get(&self, key: &str) -> Option<&CharacterVoice> {
        self.entries.get(&key.to_lowercase())
    }

    /// Profile for a speaker key, falling back to the narrator profile for
    /// unknown speakers.
    pub fn voice_for(&self, key: &str) -> VoiceProfile {
        self.get(key).map(|cv| cv.voice).unwrap_or(NARRATOR)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in detection order, narrator first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Display list, narrator first, remaining characters alphabetically.
    pub fn all(&self) -> Vec<CharacterVoice> {
        let mut list: Vec<CharacterVoice> = self.entries.values().cloned().collect();
        list.sort_by(|a, b| {
            b.is_narrator
                .cmp(&a.is_narrator)
                .then_with(|| a.character_name.cmp(&b.character_name))
        });
        list
    }

    fn used_profile_names(&self) -> Vec<&'static str> {
        self.entries.values().map(|cv| cv.voice.name).collect()
    }
}

/// Picks a voice for one detected character.
///
/// Children's stories get the warm voice family regardless of gender: named
/// grandmothers and mothers keep their dedicated profiles, everyone else
/// narrates as the grandmother. Otherwise the gender pool is walked in
/// priority order and the first profile not already assigned wins; once the
/// pool is exhausted the primary variant is reused, which is fine.
pub fn assign_voice(name: &str, gender: Gender, genre: &str, assigned: &VoiceMap) -> VoiceProfile {
    if genre.eq_ignore_ascii_case("children") {
        let name = name.to_lowercase();
        if name.contains("grandmother") || name.contains("grandma") {
            return GRANDMOTHER;
        }
        if name.contains("mother") || name.contains("mom") {
            return MOTHER;
        }
        return GRANDMOTHER;
    }

    let pool: &[VoiceProfile] = match gender {
        Gender::Male => &MALE_POOL,
        Gender::Female => &FEMALE_POOL,
        Gender::Unknown => return NARRATOR,
    };

    let used = assigned.used_profile_names();
    pool.iter()
        .find(|p| !used.contains(&p.name))
        .copied()
        .unwrap_or(pool[0])
}
