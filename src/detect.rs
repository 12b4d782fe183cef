use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Best-effort gender read for a character, inferred from the story text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// Finds candidate character names in a full story text.
///
/// Implementations are heuristics, not parsers: common capitalized words can
/// be misread as names and characters that never sit next to a trigger verb
/// are missed. Both are accepted; the goal is plausible coverage.
pub trait CharacterDetector: Send + Sync {
    fn detect(&self, text: &str) -> Vec<String>;
}

/// Infers a character's likely gender from the full story text.
pub trait GenderClassifier: Send + Sync {
    fn classify(&self, name: &str, text: &str) -> Gender;
}

pub(crate) fn dialogue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""([^"]+)"\s*,?\s*([A-Za-z][A-Za-z ]*?)\s+(?:said|asked|replied|whispered|shouted|exclaimed)"#)
            .expect("valid regex")
    })
}

fn introduction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][A-Za-z]+)\s+(?:was|is|stood|walked|looked|smiled|frowned|said)")
            .expect("valid regex")
    })
}

/// Two-pattern regex detector: dialogue attribution (`"...", Name said`)
/// and descriptive introduction (`Name was/stood/...`).
#[derive(Debug, Default)]
pub struct RegexCharacterDetector;

impl RegexCharacterDetector {
    pub fn new() -> Self {
        Self
    }
}

impl CharacterDetector for RegexCharacterDetector {
    fn detect(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let mut push = |name: &str| {
            let name = name.trim();
            if seen.insert(name.to_lowercase()) {
                names.push(name.to_string());
            }
        };

        for caps in dialogue_re().captures_iter(text) {
            let name = caps[2].trim();
            if name.len() > 1 && name.len() < 20 {
                push(name);
            }
        }

        for caps in introduction_re().captures_iter(text) {
            let name = caps[1].trim();
            if name.len() > 2 && name.len() < 15 {
                push(name);
            }
        }

        names
    }
}

const MALE_INDICATORS: &[&str] = &[
    "he ", "him ", "his ", "himself", "man", "boy", "father", "dad", "brother", "son", "king",
    "prince", "lord", "sir", "mr.", "gentleman", "guy", "male",
];

const FEMALE_INDICATORS: &[&str] = &[
    "she ", "her ", "hers", "herself", "woman", "girl", "mother", "mom", "sister", "daughter",
    "queen", "princess", "lady", "madam", "mrs.", "ms.", "miss", "female",
];

const COMMON_MALE_NAMES: &[&str] = &[
    "john", "james", "michael", "david", "william", "richard", "thomas", "alexander",
];

const COMMON_FEMALE_NAMES: &[&str] = &[
    "mary", "patricia", "jennifer", "linda", "elizabeth", "barbara", "susan", "sarah",
];

/// Indicator-phrase classifier. Scores the whole story text, not just the
/// character's own lines, so every character in a heavily one-gendered
/// story tends toward the same class. That scope is intentional and
/// observable behavior; a well-known first name overrides the scores.
#[derive(Debug, Default)]
pub struct LexicalGenderClassifier;

impl LexicalGenderClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl GenderClassifier for LexicalGenderClassifier {
    fn classify(&self, name: &str, text: &str) -> Gender {
        let name = name.to_lowercase();
        if COMMON_MALE_NAMES.iter().any(|n| name.contains(n)) {
            return Gender::Male;
        }
        if COMMON_FEMALE_NAMES.iter().any(|n| name.contains(n)) {
            return Gender::Female;
        }

        let text = text.to_lowercase();
        let male_score = MALE_INDICATORS.iter().filter(|i| text.contains(*i)).count();
        let female_score = FEMALE_INDICATORS.iter().filter(|i| text.contains(*i)).count();
        if male_score > female_score {
            Gender::Male
        } else if female_score > male_score {
            Gender::Female
        } else {
            Gender::Unknown
        }
    }
}
