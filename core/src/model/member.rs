use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Member,
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

impl Member {
    pub fn new(name: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            role,
        }
    }
}

/// Number of managers in a roster. A well-formed mess has exactly one.
pub fn manager_count(roster: &[Member]) -> usize {
    roster.iter().filter(|m| m.role == Role::Manager).count()
}

/// Key used for name comparison and ordering.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive lookup by display name.
pub fn find_by_name<'a>(roster: &'a [Member], name: &str) -> Option<&'a Member> {
    let key = name_key(name);
    roster.iter().find(|m| name_key(&m.name) == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name_folds_unicode_case() {
        let roster = vec![
            Member::new("Émile".into(), Role::Manager),
            Member::new("Bob".into(), Role::Member),
        ];
        assert_eq!(find_by_name(&roster, "émile").map(|m| m.name.as_str()), Some("Émile"));
        assert_eq!(find_by_name(&roster, " BOB ").map(|m| m.name.as_str()), Some("Bob"));
        assert!(find_by_name(&roster, "Emile").is_none());
    }
}
