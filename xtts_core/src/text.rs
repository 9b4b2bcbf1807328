//! Text preparation ahead of inference.

/// Abbreviations whose trailing period does not end a sentence.
/// Compared against lower-cased text.
const ABBREVIATIONS: &[&str] = &[
    "dr.", "mr.", "mrs.", "ms.", "prof.", "etc.", "vs.", "e.g.", "i.e.", "a.m.", "p.m.",
    "inc.", "ltd.", "corp.", "st.",
];

/// Length in chars of the longest entry of [`ABBREVIATIONS`].
const MAX_ABBREVIATION_LEN: usize = 5;

/// Lower-case the text and collapse runs of whitespace.
///
/// Case carries no phonetic information for the model, so it is discarded.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into chunks of at most `char_limit` characters.
///
/// Chunks follow sentence boundaries where possible; consecutive short
/// sentences are merged, an overlong sentence is cut at word boundaries.
pub fn split_sentences(text: &str, char_limit: usize) -> Vec<String> {
    let char_limit = char_limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_at_punctuation(text) {
        let len = sentence.chars().count();
        if len > char_limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_long_sentence(&sentence, char_limit));
            continue;
        }

        if current.is_empty() {
            current = sentence;
        } else if current.chars().count() + 1 + len <= char_limit {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break text after sentence-ending punctuation. Returned pieces are trimmed
/// and never empty.
fn split_at_punctuation(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        let is_break = match c {
            '!' | '?' | ';' | ':' => true,
            '.' => {
                // "3.5" and the inner dots of "e.g." stay in one piece
                let inner = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
                !inner && !ends_with_abbreviation(&chars[..=i])
            }
            _ => false,
        };

        // Runs like "?!" or "..." close the sentence on their last mark
        let next_is_terminal = chars
            .get(i + 1)
            .is_some_and(|n| matches!(n, '.' | '!' | '?'));
        if is_break && !next_is_terminal {
            let piece = current.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Whether `text` ends with a known abbreviation that starts a word.
/// Only a short tail is inspected.
fn ends_with_abbreviation(text: &[char]) -> bool {
    let start = text.len().saturating_sub(MAX_ABBREVIATION_LEN + 1);
    let tail: String = text[start..].iter().collect::<String>().to_lowercase();
    ABBREVIATIONS.iter().any(|a| {
        tail.ends_with(a)
            && tail[..tail.len() - a.len()]
                .chars()
                .last()
                .map_or(start == 0, |p| !p.is_alphanumeric())
    })
}

fn split_long_sentence(sentence: &str, char_limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > char_limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            // No whitespace to cut at: cut at the limit itself
            let letters: Vec<char> = word.chars().collect();
            for piece in letters.chunks(char_limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word_len <= char_limit {
            current.push(' ');
            current.push_str(word);
        } else {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
