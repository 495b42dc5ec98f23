// Slang normalizer
//
// Expands internet slang into plain English before classification. Matching
// is on whole tokens: a token is a run of letters, digits and apostrophes,
// so "i'll" never matches the "l" entry. Multi-word entries are tried
// before single words at each position.

use once_cell::sync::Lazy;

/// (slang, expansion) pairs; slang is lowercase and space separated
const SLANG: &[(&str, &str)] = &[
    ("brb", "be right back"),
    ("lol", "laughing"),
    ("idk", "i don't know"),
    ("idc", "i don't care"),
    ("smh", "shaking my head"),
    ("tbh", "to be honest"),
    ("imho", "in my humble opinion"),
    ("imo", "in my opinion"),
    ("fml", "my life is frustrating"),
    ("wtf", "what the heck"),
    ("nvm", "never mind"),
    ("nm", "not much"),
    ("ily", "i love you"),
    ("hbd", "happy birthday"),
    ("yolo", "you only live once"),
    ("fomo", "fear of missing out"),
    ("bet", "okay"),
    ("no cap", "no lie"),
    ("cap", "lie"),
    ("deadass", "seriously"),
    ("lowkey", "kind of secretly"),
    ("highkey", "very openly"),
    ("sus", "suspicious"),
    ("lit", "exciting"),
    ("vibing", "relaxing"),
    ("salty", "bitter"),
    ("ghosting", "ignoring me"),
    ("ghost", "ignore"),
    ("throwing shade", "insulting"),
    ("shade", "insult"),
    ("spill the tea", "share the gossip"),
    ("tea", "gossip"),
    ("extra", "over the top"),
    ("goat", "greatest of all time"),
    ("w", "win"),
    ("l", "loss"),
    ("fam", "family"),
    ("bruh", "bro"),
    ("bro", "friend"),
    ("mood", "relatable"),
];

struct SlangEntry {
    words: Vec<&'static str>,
    expansion: &'static str,
}

/// Dictionary ordered longest phrase first
static DICTIONARY: Lazy<Vec<SlangEntry>> = Lazy::new(|| {
    let mut entries: Vec<SlangEntry> = SLANG
        .iter()
        .map(|(slang, expansion)| SlangEntry {
            words: slang.split(' ').collect(),
            expansion,
        })
        .collect();
    entries.sort_by(|a, b| b.words.len().cmp(&a.words.len()));
    entries
});

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Word(&'a str),
    Gap(&'a str),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

fn split_pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_word: Option<bool> = None;

    for (idx, c) in text.char_indices() {
        let word = is_word_char(c);
        match in_word {
            Some(current) if current != word => {
                let slice = &text[start..idx];
                pieces.push(if current { Piece::Word(slice) } else { Piece::Gap(slice) });
                start = idx;
            }
            _ => {}
        }
        in_word = Some(word);
    }

    if let Some(current) = in_word {
        let slice = &text[start..];
        pieces.push(if current { Piece::Word(slice) } else { Piece::Gap(slice) });
    }

    pieces
}

/// Try to match `entry` starting at `pieces[i]`; returns pieces consumed
fn match_entry(pieces: &[Piece<'_>], i: usize, entry: &SlangEntry) -> Option<usize> {
    let mut pos = i;
    for (n, expected) in entry.words.iter().enumerate() {
        if n > 0 {
            match pieces.get(pos) {
                Some(Piece::Gap(gap)) if gap.chars().all(char::is_whitespace) => pos += 1,
                _ => return None,
            }
        }
        match pieces.get(pos) {
            Some(Piece::Word(word)) if word == expected => pos += 1,
            _ => return None,
        }
    }
    Some(pos - i)
}

/// Lowercase and expand slang
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let pieces = split_pieces(&lowered);

    let mut out = String::with_capacity(lowered.len() + 16);
    let mut i = 0;
    while i < pieces.len() {
        match &pieces[i] {
            Piece::Gap(gap) => {
                out.push_str(gap);
                i += 1;
            }
            Piece::Word(word) => {
                let hit = DICTIONARY
                    .iter()
                    .find_map(|entry| match_entry(&pieces, i, entry).map(|n| (entry.expansion, n)));
                match hit {
                    Some((expansion, consumed)) => {
                        out.push_str(expansion);
                        i += consumed;
                    }
                    None => {
                        out.push_str(word);
                        i += 1;
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_slang() {
        assert_eq!(normalize("idk tbh"), "i don't know to be honest");
        assert_eq!(
            normalize("lowkey thinking about ending it all"),
            "kind of secretly thinking about ending it all"
        );
    }

    #[test]
    fn test_apostrophe_words_untouched() {
        assert_eq!(normalize("I'll be fine, we'll see"), "i'll be fine, we'll see");
        assert_eq!(normalize("I\u{2019}ll go"), "i'll go");
    }

    #[test]
    fn test_multi_word_phrases_win() {
        assert_eq!(normalize("no cap that was wild"), "no lie that was wild");
        assert_eq!(normalize("cap"), "lie");
        assert_eq!(normalize("spill the tea!"), "share the gossip!");
    }

    #[test]
    fn test_substrings_not_replaced() {
        assert_eq!(normalize("capital letters"), "capital letters");
        assert_eq!(normalize("literally"), "literally");
        assert_eq!(normalize("I feel dead inside"), "i feel dead inside");
    }

    #[test]
    fn test_crisis_phrases_preserved() {
        for text in ["I want to kill myself", "better off dead", "end it all", "hurt myself"] {
            assert_eq!(normalize(text), text.to_lowercase());
        }
    }

    #[test]
    fn test_punctuation_and_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("bro... smh"), "friend... shaking my head");
    }
}
