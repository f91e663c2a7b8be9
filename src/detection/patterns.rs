//! Reference detection patterns.
//!
//! Static Turkish pattern data for the reference detector. Patterns run
//! against text normalized by [`super::normalize`] (Turkish-aware lowercase,
//! trimmed), so none of them needs a case-insensitive flag.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

use crate::models::ReferenceType;

/// Surface shape of a match within its category.
///
/// The resolver picks splice templates and guidance wording by form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceForm {
    /// "ya akşam?", "peki öğlen?"
    PrefixParticle,
    /// "ne kadar?", "yeterli mi?"
    BareQuantity,
    /// "olur mu?", "yiyebilir miyim?"
    ModalOnly,
    /// "bu ilaç", "şu yemek"
    DemonstrativeNoun,
    /// "onların", "bunların"
    PluralPossessive,
    /// "onun", "bunun"
    SingularPossessive,
    /// "onu", "bundan"
    Accusative,
    /// "arasındaki fark", "hangisi daha"
    Difference,
    /// "daha fazla", "ekmekten az"
    Quantity,
    /// "diğerleri", "başka"
    Other,
    /// "daha önce", "geçen sefer"
    Before,
    /// "hala", "halen"
    Still,
    /// "yine", "tekrar"
    Again,
    /// "sonra", "ardından"
    After,
    /// Sentence-initial continuation particle.
    Marker,
    /// "ilki", "ikincisi"
    Ordinal,
    /// "önerdiğin", "tavsiye ettiğin"
    Recommended,
    /// "söylediğin", "listelediğin"
    Said,
    /// "iyi mi", "zararlı mı"
    Evaluative,
    /// "neden?" on its own
    BareWhy,
    /// "ne yüzünden", "sebebi ne"
    CausePhrase,
    /// "gerekli mi", "lazım mı"
    Necessity,
    /// "nasıl?" on its own
    BareHow,
    /// "adım adım", "hangi sırayla"
    Steps,
    /// "hatırlıyor musun"
    Recall,
}

/// A reference signal pattern with its category and confidence.
#[derive(Debug)]
pub struct ReferenceSignal {
    /// The regex pattern to match.
    pub pattern: Regex,
    /// The category this pattern indicates.
    pub reference_type: ReferenceType,
    /// Surface shape within the category.
    pub form: SurfaceForm,
    /// Detector confidence for a match.
    pub confidence: f32,
    /// Human-readable description of the signal.
    #[allow(dead_code)]
    pub description: &'static str,
}

fn signal(
    pattern: &str,
    reference_type: ReferenceType,
    form: SurfaceForm,
    confidence: f32,
    description: &'static str,
) -> ReferenceSignal {
    ReferenceSignal {
        pattern: Regex::new(pattern).expect("static regex: reference signal"),
        reference_type,
        form,
        confidence,
        description,
    }
}

/// Ordered signal battery. Category order is detection order; within a
/// category the first matching signal wins.
pub static REFERENCE_SIGNALS: LazyLock<Vec<ReferenceSignal>> = LazyLock::new(|| {
    use ReferenceType as T;
    use SurfaceForm as F;

    vec![
        // Ellipsis
        signal(
            r"^(?:ya|peki|ve)\s+\p{L}+(?:\s+\p{L}+){0,2}\s*\?*$",
            T::Ellipsis,
            F::PrefixParticle,
            0.9,
            "ya/peki/ve + short fragment",
        ),
        signal(
            r"^(?:ne\s+kadar|kaç(?:\s+tane)?|yeterli\s+mi|fazla\s+mı|az\s+mı)\s*\?*$",
            T::Ellipsis,
            F::BareQuantity,
            0.85,
            "bare quantity question",
        ),
        signal(
            r"^(?:olur\s+mu|yapabilir\s+miyim|yiyebilir\s+miyim|içebilir\s+miyim|gerekir\s+mi)\s*\?*$",
            T::Ellipsis,
            F::ModalOnly,
            0.8,
            "modal-only question",
        ),
        // Definite reference
        signal(
            r"\b(?:bu|şu|o)\s+(?:ila[çc]|yemek|besin|değer|ölçüm|egzersiz|belirti|sonu[çc])\w*",
            T::Definite,
            F::DemonstrativeNoun,
            0.85,
            "demonstrative + noun",
        ),
        signal(
            r"\b(?:onların|bunların|şunların)\b",
            T::Definite,
            F::PluralPossessive,
            0.8,
            "plural possessive pronoun",
        ),
        signal(
            r"\b(?:onun|bunun|şunun)\b",
            T::Definite,
            F::SingularPossessive,
            0.8,
            "singular possessive pronoun",
        ),
        signal(
            r"\b(?:onu|bunu|şunu|ondan|bundan|şundan|ona|buna|şuna)\b",
            T::Definite,
            F::Accusative,
            0.8,
            "accusative/ablative pronoun",
        ),
        // Comparative
        signal(
            r"arasındaki\s+fark|\bfarkı?\s+ne\b|\bhangisi\s+daha\b",
            T::Comparative,
            F::Difference,
            0.85,
            "difference between",
        ),
        signal(
            r"\bdaha\s+(?:fazla|az|çok|yüksek|düşük)\b|\b\p{L}+(?:den|dan|ten|tan)\s+(?:fazla|az|çok|yüksek|düşük)\b",
            T::Comparative,
            F::Quantity,
            0.8,
            "more/less than",
        ),
        signal(
            r"\b(?:diğer|başka|geri\s+kalan)\w*",
            T::Comparative,
            F::Other,
            0.7,
            "other/remaining",
        ),
        // Temporal
        signal(
            r"\b(?:daha\s+önce|geçen\s+sefer|az\s+önce|demin|önceden|önce)\b",
            T::Temporal,
            F::Before,
            0.8,
            "before/earlier",
        ),
        signal(
            r"\b(?:hala|hâlâ|halen|hâlen)\b",
            T::Temporal,
            F::Still,
            0.8,
            "still",
        ),
        signal(
            r"\b(?:yine|tekrar|gene)\b",
            T::Temporal,
            F::Again,
            0.7,
            "again",
        ),
        signal(
            r"\b(?:sonra|sonrasında|ardından)\b",
            T::Temporal,
            F::After,
            0.7,
            "after",
        ),
        // Discourse markers
        signal(
            r"^(?:peki|tamam|evet|hayır|anladım|o\s+zaman|yani|ayrıca|bir\s+de)\b",
            T::DiscourseMarker,
            F::Marker,
            0.6,
            "sentence-initial continuation particle",
        ),
        // Assistant output references
        signal(
            r"\b(?:ilk|birinci|ikinci|üçüncü|dördüncü|beşinci|sonuncu)(?:[iıuü]|s[iıuü])?(?:n[iıuü]|nde|nden|ne)?\b",
            T::AiOutput,
            F::Ordinal,
            0.8,
            "ordinal reference",
        ),
        signal(
            r"\b(?:önerdiğ|tavsiye\s+ettiğ)\w*",
            T::AiOutput,
            F::Recommended,
            0.85,
            "what you recommended",
        ),
        signal(
            r"\b(?:söylediğ|bahsettiğ|listelediğ|yazdığ|verdiğ)\w*",
            T::AiOutput,
            F::Said,
            0.8,
            "what you said/listed",
        ),
        // Evaluation
        signal(
            r"\b(?:iyi|kötü|zararlı|faydalı|yararlı|sağlıklı|güvenli|uygun|tehlikeli|sakıncalı)\s+m[iıuü]\b",
            T::Evaluation,
            F::Evaluative,
            0.75,
            "is it good/bad/safe",
        ),
        // Causality
        signal(
            r"^(?:peki\s+|ya\s+)?(?:neden|niye|niçin)\s*\?*$",
            T::Causality,
            F::BareWhy,
            0.85,
            "bare why",
        ),
        signal(
            r"\b(?:neden\s+dolayı|ne\s+yüzünden|neyden\s+kaynaklan\w*|sebebi\s+ne|nedeni\s+ne)",
            T::Causality,
            F::CausePhrase,
            0.85,
            "because of what",
        ),
        // Modal
        signal(
            r"\b(?:gerekli|şart|zorunlu|mecburi|yasak|serbest|gerekir|gerekiyor|lazım)\s+m[iıuü]\b",
            T::Modal,
            F::Necessity,
            0.75,
            "is it necessary/permitted",
        ),
        // Process
        signal(
            r"^(?:peki\s+|ya\s+)?nasıl\s*\?*$",
            T::Process,
            F::BareHow,
            0.7,
            "bare how",
        ),
        signal(
            r"\b(?:adım\s+adım|hangi\s+sırayla|nasıl\s+yapılır|nasıl\s+yapmalıyım)",
            T::Process,
            F::Steps,
            0.7,
            "step sequence",
        ),
        // Memory recall
        signal(
            r"\b(?:hatırlıyor\s+musun\w*|hatırla\w*|unuttun\s+mu|konuşmuştuk|demiştin|söylemiştin|bahsetmiştin)",
            T::MemoryRecall,
            F::Recall,
            0.9,
            "do you remember",
        ),
    ]
});

/// Sentence-initial discourse markers stripped before memory lookups.
pub static LEADING_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:peki|tamam|evet|hayır|anladım|o\s+zaman|yani|ayrıca|bir\s+de)\b[\s,]*)+")
        .expect("static regex: leading markers")
});

/// Position in a presented list named by an ordinal word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPosition {
    /// Zero-based index.
    Index(usize),
    /// The last item.
    Last,
}

/// Ordinal stems. `sonuncu` is checked first so it never reads as an index.
pub const ORDINAL_STEMS: &[(&str, ListPosition)] = &[
    ("sonuncu", ListPosition::Last),
    ("birinci", ListPosition::Index(0)),
    ("ikinci", ListPosition::Index(1)),
    ("üçüncü", ListPosition::Index(2)),
    ("dördüncü", ListPosition::Index(3)),
    ("beşinci", ListPosition::Index(4)),
    ("ilk", ListPosition::Index(0)),
];
