use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

lazy_static! {
    static ref RESERVED_KEY_CHARS: Regex = Regex::new(r"[.#$\[\]/]").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref DIGIT: Regex = Regex::new(r"\d").unwrap();
    static ref UNUSUAL_CHAR: Regex = Regex::new(r"[^a-zA-Z\-\s'.]").unwrap();
    static ref DOUBLE_SPACE: Regex = Regex::new(r"\s{2,}").unwrap();
}

/// A participant as persisted under `EventEye/participants/{event}/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Loosely-filled participant record as it arrives from a CSV row or a form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl ParticipantInput {
    pub fn named(name: &str, email: &str, phone: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            phone: Some(phone.to_string()),
            ..Self::default()
        }
    }

    /// Trim every field, derive the id and stamp the record
    ///
    /// `createdAt` is kept when the input carries one, so re-saving a record does not
    /// reset it; `updatedAt` is always `now_ms`.
    pub fn normalize(&self, now_ms: i64) -> Participant {
        Participant {
            id: participant_id(self),
            name: trimmed(&self.name),
            email: trimmed(&self.email),
            phone: trimmed(&self.phone),
            meta: self
                .meta
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
            created_at: self.created_at.unwrap_or(now_ms),
            updated_at: now_ms,
        }
    }
}

impl From<&Participant> for ParticipantInput {
    fn from(p: &Participant) -> Self {
        Self {
            id: Some(p.id.clone()),
            name: Some(p.name.clone()),
            email: Some(p.email.clone()),
            phone: Some(p.phone.clone()),
            meta: Some(p.meta.clone()),
            created_at: Some(p.created_at),
        }
    }
}

fn trimmed(field: &Option<String>) -> String {
    field.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Make a string safe to use as a single database path segment
///
/// Replaces the characters the document store reserves (`. # $ [ ] /`) with `_`.
pub fn sanitize_key(input: &str) -> String {
    RESERVED_KEY_CHARS
        .replace_all(input, "_")
        .trim()
        .to_string()
}

/// Derive the stable identifier of a participant
///
/// Priority: supplied id, then e-mail (lower-cased), then phone, then a random UUID.
/// The same e-mail or phone always yields the same id, so re-importing a CSV
/// overwrites rather than duplicates.
///
/// # Examples
/// ```
/// use eventeye::participant::{ParticipantInput, participant_id};
///
/// let p = ParticipantInput::named("Asha Rao", " Asha.Rao@Example.com ", "");
/// assert_eq!(participant_id(&p), "email:asha_rao@example_com");
/// ```
pub fn participant_id(input: &ParticipantInput) -> String {
    if let Some(id) = non_blank(&input.id) {
        return id.to_string();
    }
    if let Some(email) = non_blank(&input.email) {
        return format!("email:{}", sanitize_key(&email.to_lowercase()));
    }
    if let Some(phone) = non_blank(&input.phone) {
        return format!("phone:{}", sanitize_key(phone));
    }
    uuid::Uuid::new_v4().to_string()
}

/// Collapse whitespace and capitalize each word ("  asha   RAO " -> "Asha Rao")
pub fn sanitize_name(input: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(input.trim(), " ");
    collapsed
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameIssue {
    TooShort,
    ContainsNumbers,
    UnusualCharacters,
    ConsecutiveSpaces,
}

impl fmt::Display for NameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NameIssue::TooShort => "Name too short",
            NameIssue::ContainsNumbers => "Name contains numbers",
            NameIssue::UnusualCharacters => "Name contains unusual characters",
            NameIssue::ConsecutiveSpaces => "Multiple consecutive spaces",
        };
        f.write_str(text)
    }
}

pub fn detect_name_issues(name: &str) -> Vec<NameIssue> {
    let mut issues = Vec::new();
    if name.chars().count() < 2 {
        issues.push(NameIssue::TooShort);
    }
    if DIGIT.is_match(name) {
        issues.push(NameIssue::ContainsNumbers);
    }
    if UNUSUAL_CHAR.is_match(name) {
        issues.push(NameIssue::UnusualCharacters);
    }
    if DOUBLE_SPACE.is_match(name) {
        issues.push(NameIssue::ConsecutiveSpaces);
    }
    issues
}

/// Result of checking a participant name before it is printed on a certificate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameValidation {
    pub original: String,
    pub suggestion: String,
    pub issues: Vec<NameIssue>,
    /// 1.0 for a clean name, minus 0.15 per issue, floored at 0
    pub confidence: f32,
}

pub fn validate_name(name: &str) -> NameValidation {
    let issues = detect_name_issues(name);
    let confidence = (1.0 - issues.len() as f32 * 0.15).max(0.0);
    NameValidation {
        original: name.to_string(),
        suggestion: sanitize_name(name),
        issues,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_key_replaces_reserved_characters() {
        assert_eq!(sanitize_key(" a.b#c$d[e]f/g "), "a_b_c_d_e_f_g");
    }

    #[test]
    fn sanitize_name_capitalizes_words() {
        assert_eq!(sanitize_name("  asha   RAO "), "Asha Rao");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn confidence_drops_per_issue() {
        let v = validate_name("a1");
        assert_eq!(v.issues, vec![NameIssue::ContainsNumbers, NameIssue::UnusualCharacters]);
        assert!((v.confidence - 0.7).abs() < 1e-6);
    }
}
