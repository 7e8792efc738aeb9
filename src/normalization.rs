use serde::{Deserialize, Deserializer};

/// Normalizes a name by stripping any whitespace and decomposing it
/// into Unicode Normalization Form D.
///
/// ```
/// use catalog::normalization::normalize_name;
/// assert_eq!(normalize_name(" Café "), normalize_name("Café"));
/// ```
pub fn normalize_name(name: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    name.as_ref().trim().nfd().to_string()
}

/// Normalizes every tag like a name and drops the ones left empty.
/// Order is preserved.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    tags.iter()
        .map(normalize_name)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Deserializes a `String` after running it through `normalize_name`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(normalize_name(s))
}

/// Deserializes a list of tags after running it through `normalize_tags`.
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Vec::<String>::deserialize(deserializer)?;
    Ok(normalize_tags(&tags))
}
