//! Trip slots and the merge/completeness rules applied on every turn.
//!
//! A value is *empty* when it is missing, blank, or one of the placeholder
//! strings `none` / `null` (any case). A list is empty when it has no
//! elements or every element is empty. Merging never clears a filled slot.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The seven pieces of information a plan needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotField {
    Departure,
    Destination,
    StartDate,
    Duration,
    Budget,
    Interests,
    ExtraDetails,
}

impl SlotField {
    /// Every field, in the order follow-up questions ask for them.
    pub const ALL: [SlotField; 7] = [
        SlotField::Departure,
        SlotField::Destination,
        SlotField::StartDate,
        SlotField::Duration,
        SlotField::Budget,
        SlotField::Interests,
        SlotField::ExtraDetails,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SlotField::Departure => "Departure",
            SlotField::Destination => "Destination",
            SlotField::StartDate => "StartDate",
            SlotField::Duration => "Duration",
            SlotField::Budget => "Budget",
            SlotField::Interests => "Interests",
            SlotField::ExtraDetails => "ExtraDetails",
        }
    }

    /// Short description used when asking a model to fill the field.
    pub fn describe(self) -> &'static str {
        match self {
            SlotField::Departure => "city or airport the trip starts from",
            SlotField::Destination => "one or more places to visit",
            SlotField::StartDate => "departure date as YYYY-MM-DD",
            SlotField::Duration => "length of the trip",
            SlotField::Budget => "total budget including currency",
            SlotField::Interests => "activities or themes the traveller enjoys",
            SlotField::ExtraDetails => {
                "anything else: travellers, accessibility, pace, dietary needs"
            }
        }
    }
}

impl fmt::Display for SlotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slots accumulated for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Slots {
    pub departure: Option<String>,
    pub destination: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub duration: Option<String>,
    pub budget: Option<String>,
    pub interests: Option<Vec<String>>,
    pub extra_details: Option<Vec<String>>,
}

impl Slots {
    pub fn is_filled(&self, field: SlotField) -> bool {
        match field {
            SlotField::Departure => !is_empty_value(self.departure.as_deref()),
            SlotField::Destination => !is_empty_list(self.destination.as_deref()),
            SlotField::StartDate => !is_empty_value(self.start_date.as_deref()),
            SlotField::Duration => !is_empty_value(self.duration.as_deref()),
            SlotField::Budget => !is_empty_value(self.budget.as_deref()),
            SlotField::Interests => !is_empty_list(self.interests.as_deref()),
            SlotField::ExtraDetails => !is_empty_list(self.extra_details.as_deref()),
        }
    }

    pub fn is_complete(&self) -> bool {
        SlotField::ALL.iter().all(|field| self.is_filled(*field))
    }

    /// Human readable value of a field, or `None` when it is empty.
    pub fn display(&self, field: SlotField) -> Option<String> {
        if !self.is_filled(field) {
            return None;
        }
        let scalar = |value: &Option<String>| value.clone();
        let list = |value: &Option<Vec<String>>| value.as_ref().map(|items| items.join(", "));
        match field {
            SlotField::Departure => scalar(&self.departure),
            SlotField::Destination => list(&self.destination),
            SlotField::StartDate => scalar(&self.start_date),
            SlotField::Duration => scalar(&self.duration),
            SlotField::Budget => scalar(&self.budget),
            SlotField::Interests => list(&self.interests),
            SlotField::ExtraDetails => list(&self.extra_details),
        }
    }
}

/// One extraction's worth of slot values. Any field may be absent or hold
/// a placeholder; [`merge`] decides what is kept.
///
/// Deserializes leniently from model output: a list field may arrive as a
/// single string and a scalar as a number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartialSlots {
    #[serde(default, deserialize_with = "scalar")]
    pub departure: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub destination: Option<Vec<String>>,
    #[serde(default, deserialize_with = "scalar")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub budget: Option<String>,
    #[serde(default, alias = "Interest", deserialize_with = "one_or_many")]
    pub interests: Option<Vec<String>>,
    #[serde(default, alias = "ExtraDetail", deserialize_with = "one_or_many")]
    pub extra_details: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        Option::<ScalarValue>::deserialize(deserializer)?.map(|value| match value {
            ScalarValue::Text(text) => text,
            ScalarValue::Number(number) => number.to_string(),
            ScalarValue::Flag(flag) => flag.to_string(),
        }),
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<Option<String>>),
}

fn one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|value| match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items.into_iter().flatten().collect(),
        }),
    )
}

pub fn is_empty_value(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(text) => {
            let text = text.trim();
            text.is_empty() || text.eq_ignore_ascii_case("none") || text.eq_ignore_ascii_case("null")
        }
    }
}

pub fn is_empty_list(value: Option<&[String]>) -> bool {
    value.map_or(true, |items| {
        items.iter().all(|item| is_empty_value(Some(item)))
    })
}

fn pick_value(old: &Option<String>, extracted: &Option<String>) -> Option<String> {
    if is_empty_value(extracted.as_deref()) {
        normalize_value(old)
    } else {
        extracted.clone()
    }
}

fn pick_list(old: &Option<Vec<String>>, extracted: &Option<Vec<String>>) -> Option<Vec<String>> {
    if is_empty_list(extracted.as_deref()) {
        normalize_list(old)
    } else {
        extracted.clone()
    }
}

fn normalize_value(value: &Option<String>) -> Option<String> {
    value.clone().filter(|text| !is_empty_value(Some(text)))
}

fn normalize_list(value: &Option<Vec<String>>) -> Option<Vec<String>> {
    value.clone().filter(|items| !is_empty_list(Some(items)))
}

/// Fold an extraction into the existing slots.
///
/// A non-empty extracted value replaces the old one (lists are replaced,
/// not unioned); an empty one leaves the old value in place. Returns the
/// merged slots and whether all seven are now filled.
pub fn merge(old: &Slots, extracted: &PartialSlots) -> (Slots, bool) {
    let merged = Slots {
        departure: pick_value(&old.departure, &extracted.departure),
        destination: pick_list(&old.destination, &extracted.destination),
        start_date: pick_value(&old.start_date, &extracted.start_date),
        duration: pick_value(&old.duration, &extracted.duration),
        budget: pick_value(&old.budget, &extracted.budget),
        interests: pick_list(&old.interests, &extracted.interests),
        extra_details: pick_list(&old.extra_details, &extracted.extra_details),
    };
    let complete = merged.is_complete();
    (merged, complete)
}

/// Fields still empty, in [`SlotField::ALL`] order.
pub fn missing_fields(slots: &Slots) -> Vec<SlotField> {
    SlotField::ALL
        .into_iter()
        .filter(|field| !slots.is_filled(*field))
        .collect()
}
