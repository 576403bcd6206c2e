use eveboard_core::{
    ids::{CharacterId, IndustryJobId, ItemId, LocationId, TypeId},
    records::{AssetEntry, IndustryJobEntry},
    time::Timestamp,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VerifyResponse {
    #[serde(rename = "CharacterID")]
    pub character_id: u64,
    #[serde(rename = "CharacterName")]
    pub character_name: Option<String>,
    #[serde(rename = "ExpiresOn")]
    pub expires_on: Option<String>,
    #[serde(rename = "Scopes", default)]
    pub scopes: Option<String>,
}

/// Parsed payload of the SSO verify endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCharacter {
    pub character_id: CharacterId,
    pub character_name: Option<String>,
    pub scopes: Vec<String>,
    pub expires_on: Option<Timestamp>,
}

impl From<VerifyResponse> for VerifiedCharacter {
    fn from(raw: VerifyResponse) -> Self {
        let expires_on = raw.expires_on.as_deref().and_then(parse_verify_expiry);
        let scopes = raw
            .scopes
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        Self {
            character_id: CharacterId(raw.character_id),
            character_name: raw.character_name,
            scopes,
            expires_on,
        }
    }
}

// Upstream sometimes omits the zone designator.
fn parse_verify_expiry(raw: &str) -> Option<Timestamp> {
    Timestamp::parse_rfc3339(raw).or_else(|| Timestamp::parse_rfc3339(&format!("{raw}Z")))
}

#[derive(Clone, Debug, Deserialize)]
struct RawAsset {
    item_id: Option<i64>,
    type_id: Option<i32>,
    quantity: Option<i64>,
    location_id: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawIndustryJob {
    job_id: Option<i32>,
    product_type_id: Option<i32>,
    blueprint_type_id: Option<i32>,
    status: Option<String>,
    output_location_id: Option<i64>,
}

/// Rows that passed validation plus a count of the ones that did not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated<T> {
    pub rows: Vec<T>,
    pub dropped: usize,
}

impl<T> Default for Validated<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            dropped: 0,
        }
    }
}

pub fn validate_assets(values: Vec<Value>) -> Validated<AssetEntry> {
    validate_rows(values, |raw: RawAsset| {
        Some(AssetEntry {
            item_id: ItemId(raw.item_id?),
            type_id: TypeId(raw.type_id?),
            quantity: raw.quantity.filter(|quantity| *quantity >= 0)?,
            location_id: LocationId(raw.location_id?),
        })
    })
}

pub fn validate_industry_jobs(values: Vec<Value>) -> Validated<IndustryJobEntry> {
    validate_rows(values, |raw: RawIndustryJob| {
        let status = raw.status.filter(|status| !status.trim().is_empty())?;
        Some(IndustryJobEntry {
            job_id: IndustryJobId(raw.job_id?),
            type_id: TypeId(raw.product_type_id.or(raw.blueprint_type_id)?),
            status,
            output_location_id: LocationId(raw.output_location_id?),
        })
    })
}

fn validate_rows<R, T>(values: Vec<Value>, convert: impl Fn(R) -> Option<T>) -> Validated<T>
where
    R: for<'de> Deserialize<'de>,
{
    let mut validated = Validated::default();
    for value in values {
        match serde_json::from_value::<R>(value).ok().and_then(&convert) {
            Some(row) => validated.rows.push(row),
            None => validated.dropped += 1,
        }
    }
    validated
}

#[cfg(test)]
mod tests {
    use eveboard_core::ids::{CharacterId, TypeId};
    use serde_json::json;

    use super::{VerifiedCharacter, VerifyResponse, validate_assets, validate_industry_jobs};

    #[test]
    fn malformed_asset_rows_are_dropped_and_counted() {
        let validated = validate_assets(vec![
            json!({"item_id": 1, "type_id": 34, "quantity": 100, "location_id": 60003760, "location_flag": "Hangar"}),
            json!({"item_id": 2, "type_id": "not a number", "quantity": 1, "location_id": 60003760}),
            json!({"item_id": 3, "quantity": 1, "location_id": 60003760}),
            json!({"item_id": 4, "type_id": 34, "quantity": -5, "location_id": 60003760}),
            json!("garbage"),
        ]);

        assert_eq!(validated.rows.len(), 1);
        assert_eq!(validated.rows[0].type_id, TypeId(34));
        assert_eq!(validated.dropped, 4);
    }

    #[test]
    fn industry_job_type_falls_back_to_blueprint() {
        let validated = validate_industry_jobs(vec![
            json!({"job_id": 7, "blueprint_type_id": 691, "status": "active", "output_location_id": 1}),
            json!({"job_id": 8, "blueprint_type_id": 691, "product_type_id": 587, "status": "delivered", "output_location_id": 1}),
            json!({"job_id": 9, "blueprint_type_id": 691, "status": "", "output_location_id": 1}),
        ]);

        assert_eq!(validated.dropped, 1);
        assert_eq!(validated.rows[0].type_id, TypeId(691));
        assert!(validated.rows[0].is_active());
        assert_eq!(validated.rows[1].type_id, TypeId(587));
    }

    #[test]
    fn verify_payload_parses_space_separated_scopes() {
        let raw: VerifyResponse = serde_json::from_value(json!({
            "CharacterID": 1001,
            "CharacterName": "Pilot",
            "ExpiresOn": "2026-01-02T03:04:05",
            "Scopes": "publicData esi-assets.read_assets.v1",
            "TokenType": "Character"
        }))
        .expect("verify payload parses");

        let verified = VerifiedCharacter::from(raw);
        assert_eq!(verified.character_id, CharacterId(1001));
        assert_eq!(verified.scopes.len(), 2);
        assert!(verified.expires_on.is_some());
    }
}
