use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::ids::{CategoryId, GroupId, MarketGroupId, TypeId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SdeType {
    pub type_id: TypeId,
    pub name: String,
    pub group_id: GroupId,
    pub market_group_id: Option<MarketGroupId>,
    pub volume: Option<f64>,
    pub portion_size: Option<i32>,
    pub base_price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SdeGroup {
    pub group_id: GroupId,
    pub name: String,
    pub category_id: Option<CategoryId>,
}

/// Immutable type/group lookup built once from the static data export.
#[derive(Clone, Debug, Default)]
pub struct SdeIndex {
    types: HashMap<TypeId, SdeType>,
    groups: HashMap<GroupId, SdeGroup>,
}

impl SdeIndex {
    /// Later duplicates of an id are ignored; the first line wins.
    pub fn new(types: Vec<SdeType>, groups: Vec<SdeGroup>) -> Self {
        let mut type_map = HashMap::with_capacity(types.len());
        for sde_type in types {
            type_map.entry(sde_type.type_id).or_insert(sde_type);
        }

        let mut group_map = HashMap::with_capacity(groups.len());
        for group in groups {
            group_map.entry(group.group_id).or_insert(group);
        }

        Self {
            types: type_map,
            groups: group_map,
        }
    }

    pub fn from_jsonl(types_input: &str, groups_input: Option<&str>) -> Result<Self, SdeError> {
        let types = parse_sde_types(types_input)?;
        let groups = match groups_input {
            Some(input) => parse_sde_groups(input)?,
            None => Vec::new(),
        };
        Ok(Self::new(types, groups))
    }

    pub fn lookup(&self, type_id: TypeId) -> Result<&SdeType, SdeError> {
        self.types
            .get(&type_id)
            .ok_or(SdeError::TypeNotFound(type_id))
    }

    pub fn lookup_group(&self, group_id: GroupId) -> Result<&SdeGroup, SdeError> {
        self.groups
            .get(&group_id)
            .ok_or(SdeError::GroupNotFound(group_id))
    }

    pub fn type_name(&self, type_id: TypeId) -> Option<&str> {
        self.types.get(&type_id).map(|sde_type| sde_type.name.as_str())
    }

    pub fn base_price(&self, type_id: TypeId) -> Option<f64> {
        self.types.get(&type_id).and_then(|sde_type| sde_type.base_price)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

pub fn parse_sde_types(input: &str) -> Result<Vec<SdeType>, SdeError> {
    let mut types = Vec::new();

    for (line, object) in jsonl_objects(input)? {
        let type_id = required_id(&object, &["_key", "typeID", "id"], line, "type id")?;
        let group_id = required_id(&object, &["groupID", "group_id"], line, "group id")?;

        types.push(SdeType {
            type_id: TypeId(type_id),
            name: localized_name(&object).unwrap_or_default(),
            group_id: GroupId(group_id),
            market_group_id: optional_id(&object, &["marketGroupID", "market_group_id"], line)?
                .map(MarketGroupId),
            volume: optional_number(&object, "volume", line)?,
            portion_size: optional_id(&object, &["portionSize", "portion_size"], line)?,
            base_price: optional_number(&object, "basePrice", line)?
                .or(optional_number(&object, "base_price", line)?),
        });
    }

    Ok(types)
}

pub fn parse_sde_groups(input: &str) -> Result<Vec<SdeGroup>, SdeError> {
    let mut groups = Vec::new();

    for (line, object) in jsonl_objects(input)? {
        let group_id = required_id(&object, &["_key", "groupID", "id"], line, "group id")?;

        groups.push(SdeGroup {
            group_id: GroupId(group_id),
            name: localized_name(&object).unwrap_or_default(),
            category_id: optional_id(&object, &["categoryID", "category_id"], line)?
                .map(CategoryId),
        });
    }

    Ok(groups)
}

fn jsonl_objects(input: &str) -> Result<Vec<(usize, Map<String, Value>)>, SdeError> {
    let mut objects = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|err| SdeError::InvalidJson {
            line,
            reason: err.to_string(),
        })?;

        let Value::Object(object) = value else {
            return Err(SdeError::NotAnObject { line });
        };

        if object.get("_key").and_then(Value::as_str) == Some("sde") {
            continue;
        }

        objects.push((line, object));
    }

    Ok(objects)
}

fn localized_name(object: &Map<String, Value>) -> Option<String> {
    match object.get("name")? {
        Value::String(name) => Some(name.clone()),
        Value::Object(localized) => localized
            .get("en")
            .and_then(Value::as_str)
            .or_else(|| localized.values().find_map(Value::as_str))
            .map(ToOwned::to_owned),
        _ => None,
    }
}

fn required_id(
    object: &Map<String, Value>,
    keys: &[&'static str],
    line: usize,
    field: &'static str,
) -> Result<i32, SdeError> {
    optional_id(object, keys, line)?.ok_or(SdeError::MissingField { line, field })
}

fn optional_id(
    object: &Map<String, Value>,
    keys: &[&'static str],
    line: usize,
) -> Result<Option<i32>, SdeError> {
    for key in keys {
        let Some(value) = object.get(*key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let parsed = value
            .as_i64()
            .and_then(|raw| i32::try_from(raw).ok())
            .ok_or_else(|| SdeError::InvalidField {
                line,
                field: *key,
                value: value.to_string(),
            })?;
        return Ok(Some(parsed));
    }

    Ok(None)
}

fn optional_number(
    object: &Map<String, Value>,
    key: &'static str,
    line: usize,
) -> Result<Option<f64>, SdeError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| SdeError::InvalidField {
                line,
                field: key,
                value: value.to_string(),
            }),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SdeError {
    #[error("line {line}: invalid json: {reason}")]
    InvalidJson { line: usize, reason: String },
    #[error("line {line}: expected a json object")]
    NotAnObject { line: usize },
    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },
    #[error("line {line}: invalid {field} value {value}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("type {0} not found")]
    TypeNotFound(TypeId),
    #[error("group {0} not found")]
    GroupNotFound(GroupId),
}
