use std::collections::HashMap;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use crate::model::guest_meal::GuestMealEntry;
use crate::model::meal::MealEntry;
use crate::model::member::{find_by_name, Member};
use crate::model::transaction::TransactionEntry;
use crate::time::parse_entry_date;

#[derive(Debug, PartialEq)]
pub struct ParsedInput {
    pub name: String,
    pub metadata: HashMap<String, String>,
}

/// Splits `key:value` tokens from free words.
pub fn parse_args(args: &[String]) -> ParsedInput {
    let mut name_parts = Vec::new();
    let mut metadata = HashMap::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':') {
            if !key.is_empty() {
                metadata.insert(key.to_string(), value.to_string());
                continue;
            }
        }
        name_parts.push(arg.as_str());
    }

    ParsedInput {
        name: name_parts.join(" "),
        metadata,
    }
}

/// Resolves an exact key or an unambiguous prefix of one.
pub fn expand_key(key: &str, candidates: &[&str]) -> Result<String> {
    // 1. Exact match
    if candidates.contains(&key) {
        return Ok(key.to_string());
    }

    // 2. Prefix match
    let matches: Vec<&str> = candidates
        .iter()
        .filter(|&&c| c.starts_with(key))
        .cloned()
        .collect();

    match matches.len() {
        1 => Ok(matches[0].to_string()),
        0 => Err(anyhow!("Unknown key: '{}'", key)),
        _ => Err(anyhow!("Ambiguous key: '{}' matches {:?}", key, matches)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Meal,
    Deposit,
    Expense,
    GuestMeal,
}

impl EntryKind {
    pub fn parse(input: &str) -> Result<Self> {
        match expand_key(&input.to_lowercase(), &["meal", "deposit", "expense", "guest"])?.as_str() {
            "meal" => Ok(EntryKind::Meal),
            "deposit" => Ok(EntryKind::Deposit),
            "expense" => Ok(EntryKind::Expense),
            _ => Ok(EntryKind::GuestMeal),
        }
    }

    fn known_keys(&self) -> &'static [&'static str] {
        match self {
            EntryKind::Meal => &["breakfast", "lunch", "dinner", "date"],
            EntryKind::Deposit | EntryKind::GuestMeal => &["amount", "date", "note"],
            EntryKind::Expense => &["amount", "common", "date", "note"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewEntry {
    Meal(MealEntry),
    Deposit(TransactionEntry),
    Expense(TransactionEntry),
    GuestMeal(GuestMealEntry),
}

/// Builds an entry from CLI tokens, e.g. `alice b:1 l:1 date:yesterday` for a
/// meal or `gas bill amount:200 common:yes` for an expense.
///
/// Free words name the member, except for expenses where they become the note.
pub fn parse_entry(kind: EntryKind, args: &[String], roster: &[Member], today: NaiveDate) -> Result<NewEntry> {
    let parsed = parse_args(args);

    let mut fields = HashMap::new();
    for (key, value) in parsed.metadata {
        let full_key = expand_key(&key.to_lowercase(), kind.known_keys())?;
        fields.insert(full_key, value);
    }

    let date = match fields.get("date") {
        Some(d) => parse_entry_date(d, today)?,
        None => today,
    };
    let note = fields.get("note").cloned();

    if kind == EntryKind::Expense {
        let mut entry = TransactionEntry::expense(parse_amount(&fields)?, parse_flag(&fields, "common")?.unwrap_or(false), date);
        entry.note = note.or_else(|| Some(parsed.name).filter(|n| !n.is_empty()));
        return Ok(NewEntry::Expense(entry));
    }

    if parsed.name.is_empty() {
        return Err(anyhow!("Member name is required"));
    }
    let member = find_by_name(roster, &parsed.name).ok_or_else(|| anyhow!("Unknown member: '{}'", parsed.name))?;

    match kind {
        EntryKind::Meal => {
            let breakfast = parse_flag(&fields, "breakfast")?;
            let lunch = parse_flag(&fields, "lunch")?;
            let dinner = parse_flag(&fields, "dinner")?;
            if breakfast.is_none() && lunch.is_none() && dinner.is_none() {
                return Err(anyhow!("Specify at least one of breakfast, lunch, dinner (e.g. b:1)"));
            }
            Ok(NewEntry::Meal(MealEntry::new(
                member.id.clone(),
                date,
                breakfast.unwrap_or(false),
                lunch.unwrap_or(false),
                dinner.unwrap_or(false),
            )))
        }
        EntryKind::Deposit => {
            let mut entry = TransactionEntry::deposit(member.id.clone(), member.name.clone(), parse_amount(&fields)?, date);
            entry.note = note;
            Ok(NewEntry::Deposit(entry))
        }
        EntryKind::GuestMeal => {
            let mut entry = GuestMealEntry::new(member.id.clone(), date, parse_amount(&fields)?);
            entry.note = note;
            Ok(NewEntry::GuestMeal(entry))
        }
        EntryKind::Expense => unreachable!("expenses are handled above"),
    }
}

fn parse_amount(fields: &HashMap<String, String>) -> Result<f64> {
    let raw = fields.get("amount").ok_or_else(|| anyhow!("amount:<value> is required"))?;
    let amount: f64 = raw.parse().map_err(|_| anyhow!("Invalid amount: '{}'", raw))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(anyhow!("Amount must be a non-negative number: '{}'", raw));
    }
    Ok(amount)
}

fn parse_flag(fields: &HashMap<String, String>, key: &str) -> Result<Option<bool>> {
    match fields.get(key).map(|v| v.to_lowercase()) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "1" | "y" | "yes" | "true" => Ok(Some(true)),
            "0" | "n" | "no" | "false" => Ok(Some(false)),
            _ => Err(anyhow!("Invalid value for {}: '{}'", key, v)),
        },
    }
}
