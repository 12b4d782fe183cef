use crate::detect;
use crate::voices::{VoiceMap, NARRATOR_KEY};

/// Decides who is speaking one paragraph.
///
/// Runs fresh for every paragraph at playback time rather than reusing the
/// story-wide scan: the same character list can produce a different speaker
/// per paragraph. Attribution order: explicit dialogue attribution for a
/// known character, then any known character named alongside a quotation
/// mark, then the narrator.
pub fn attribute(paragraph: &str, known: &VoiceMap) -> String {
    if let Some(caps) = detect::dialogue_re().captures(paragraph) {
        let key = caps[2].trim().to_lowercase();
        if known.contains(&key) {
            return key;
        }
    }

    if paragraph.contains('"') {
        let lower = paragraph.to_lowercase();
        // Detection order, so the earliest-detected character wins when
        // several share the paragraph.
        for key in known.keys().filter(|k| *k != NARRATOR_KEY) {
            if lower.contains(key) {
                return key.to_string();
            }
        }
    }

    NARRATOR_KEY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voices::{FEMALE_HEROINE, MALE_HERO};

    fn map_with(names: &[&str]) -> VoiceMap {
        let mut map = VoiceMap::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name, if i % 2 == 0 { MALE_HERO } else { FEMALE_HEROINE });
        }
        map
    }

    #[test]
    fn dialogue_attribution_wins() {
        let map = map_with(&["Marcus", "Elena"]);
        assert_eq!(attribute(r#""Hold the gate," Marcus shouted."#, &map), "marcus");
    }

    #[test]
    fn unknown_attributed_name_falls_through() {
        let map = map_with(&["Elena"]);
        // "Bob" matches the dialogue pattern but is not a known character.
        assert_eq!(attribute(r#""Hello," Bob said."#, &map), "narrator");
    }

    #[test]
    fn named_character_with_quote_is_the_speaker() {
        let map = map_with(&["Elena"]);
        assert_eq!(attribute(r#"Elena grinned. "Perfect.""#, &map), "elena");
    }

    #[test]
    fn shared_paragraph_goes_to_the_earliest_detected_character() {
        let map = map_with(&["Zoe", "Adam"]);
        assert_eq!(attribute(r#"Zoe and Adam stared. "Wow.""#, &map), "zoe");
    }

    #[test]
    fn mention_without_quotes_stays_narration() {
        let map = map_with(&["Elena"]);
        assert_eq!(attribute("Elena walked into the rain.", &map), "narrator");
    }

    #[test]
    fn plain_narration_is_narrator() {
        let map = map_with(&["Marcus"]);
        assert_eq!(attribute("The storm rolled in from the west.", &map), "narrator");
    }
}
