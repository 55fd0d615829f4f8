//! Lightweight language detection for extracted text.
//!
//! Counts very common function words per language. Good enough to tell the
//! model which language the source is in; not a general classifier.

/// Minimum stopword hits before a guess is made.
const MIN_HITS: usize = 3;

const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "is", "in", "that", "it", "was", "for", "with", "this",
            "are", "you", "have", "not", "but", "they", "from", "which",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "et", "des", "est", "une", "un", "du", "que", "qui", "dans",
            "pour", "pas", "sur", "avec", "ce", "cette", "sont", "mais",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "zu", "den", "mit",
            "sich", "auf", "für", "dem", "auch", "wird", "sind", "aber", "oder",
        ],
    ),
    (
        "es",
        &[
            "el", "los", "las", "y", "es", "una", "del", "por", "con", "para", "que", "como",
            "pero", "más", "sus", "fue", "este", "esta", "son", "muy",
        ],
    ),
    (
        "nl",
        &[
            "het", "een", "en", "van", "is", "niet", "dat", "zijn", "op", "met", "voor", "ook",
            "maar", "wordt", "dit", "bij", "naar", "heeft", "deze", "wij",
        ],
    ),
];

/// Guess the ISO 639-1 code of `text`, or `None` when there is too little signal.
pub fn detect_language(text: &str) -> Option<String> {
    let mut scores = vec![0usize; STOPWORDS.len()];

    for word in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .take(5_000)
    {
        let word = word.to_lowercase();
        for (score, (_, words)) in scores.iter_mut().zip(STOPWORDS) {
            if words.contains(&word.as_str()) {
                *score += 1;
            }
        }
    }

    // Ties resolve to the earlier entry in the table.
    let (best, hits) = scores
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |(best, top), (i, &s)| {
            if s > top {
                (i, s)
            } else {
                (best, top)
            }
        });

    (hits >= MIN_HITS).then(|| STOPWORDS[best].0.to_string())
}
