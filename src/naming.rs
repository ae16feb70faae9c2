//! Naming conventions shared by every generator.
//!
//! Casing goes through `heck`; English inflection is a small rule table that
//! covers the table names found in typical schemas.

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

const UNCOUNTABLE: &[&str] = &[
    "audio", "equipment", "feedback", "information", "knowledge", "metadata",
    "money", "news", "rice", "series", "sheep", "species", "traffic",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("quiz", "quizzes"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

/// Words ending in `o` or `us` that pluralize with `es`.
const ES_PLURALS: &[&str] = &[
    "alias", "bonus", "buffalo", "bus", "campus", "cargo", "census", "corpus", "echo",
    "focus", "hero", "potato", "status", "tomato", "torpedo", "veto", "virus",
];

/// Nouns ending in `ie`; their plurals are not `y` words.
const IE_NOUNS: &[&str] = &[
    "brownie", "calorie", "cookie", "genie", "goalie", "hoodie", "movie", "pie",
    "rookie", "selfie", "tie", "zombie",
];

/// Splits off the last word of a snake or camel cased name.
fn split_last_word(value: &str) -> (&str, &str) {
    let boundary = value
        .char_indices()
        .rev()
        .find(|(i, c)| *c == '_' || (*i > 0 && c.is_uppercase()))
        .map(|(i, c)| if c == '_' { i + 1 } else { i })
        .unwrap_or(0);
    value.split_at(boundary)
}

/// Re-applies the casing of `template` to `word`.
fn match_case(template: &str, word: &str) -> String {
    if !template.is_empty() && template.chars().all(|c| !c.is_lowercase()) {
        return word.to_uppercase();
    }
    let mut chars = word.chars();
    match (template.chars().next(), chars.next()) {
        (Some(t), Some(first)) if t.is_uppercase() => first.to_uppercase().chain(chars).collect(),
        _ => word.to_string(),
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

pub fn plural(value: &str) -> String {
    let (head, word) = split_last_word(value);
    let lower = word.to_lowercase();

    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return value.to_string();
    }
    if let Some((_, many)) = IRREGULAR.iter().find(|(one, many)| *one == lower || *many == lower) {
        return format!("{}{}", head, match_case(word, many));
    }

    let plural = if ES_PLURALS.contains(&lower.as_str()) {
        format!("{}es", word)
    } else if lower.ends_with('y') && !lower[..lower.len() - 1].ends_with(is_vowel) {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        if lower.ends_with("ies") || (lower.ends_with('s') && singular(word).to_lowercase() != lower) {
            // Already plural.
            word.to_string()
        } else {
            format!("{}es", word)
        }
    } else {
        format!("{}s", word)
    };

    format!("{}{}", head, plural)
}

pub fn singular(value: &str) -> String {
    let (head, word) = split_last_word(value);
    let lower = word.to_lowercase();

    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return value.to_string();
    }
    if let Some((one, _)) = IRREGULAR.iter().find(|(one, many)| *one == lower || *many == lower) {
        return format!("{}{}", head, match_case(word, one));
    }

    let len = word.len();
    let singular = if lower.strip_suffix("es").is_some_and(|stem| ES_PLURALS.contains(&stem)) {
        word[..len - 2].to_string()
    } else if lower.strip_suffix('s').is_some_and(|stem| IE_NOUNS.contains(&stem)) {
        word[..len - 1].to_string()
    } else if lower.ends_with("ies") && len > 3 {
        format!("{}y", &word[..len - 3])
    } else if ["sses", "xes", "zes", "ches", "shes"].iter().any(|s| lower.ends_with(s)) {
        word[..len - 2].to_string()
    } else if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        word.to_string()
    } else if lower.ends_with('s') && len > 1 {
        word[..len - 1].to_string()
    } else {
        word.to_string()
    };

    format!("{}{}", head, singular)
}

/// `blog_posts` -> `BlogPosts`
pub fn studly(value: &str) -> String {
    value.to_upper_camel_case()
}

/// `blog_posts` -> `blogPosts`
pub fn camel(value: &str) -> String {
    value.to_lower_camel_case()
}

/// `BlogPosts` -> `blog_posts`
pub fn snake(value: &str) -> String {
    value.to_snake_case()
}

/// Model name for a table: `blog_posts` -> `BlogPost`.
pub fn entity_name(table: &str) -> String {
    studly(&singular(table))
}

pub fn is_translation_entity(entity: &str) -> bool {
    entity.ends_with("Translation")
}

pub fn is_translation_table(table: &str) -> bool {
    table.ends_with("_translations")
}

/// Human readable title from a column: `first_name` -> `First name`.
pub fn title_from_column(column: &str) -> String {
    let lower = column.to_lowercase();
    let mut chars = lower.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    capitalized.replace('_', " ")
}

/// PHP array literal of double quoted strings: `["id","name"]`.
pub fn php_array<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{}\"", i.as_ref())).collect();
    format!("[{}]", quoted.join(","))
}
