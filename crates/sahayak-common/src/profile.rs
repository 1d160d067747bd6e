use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reservation category recognized by the program guidelines.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub enum Category {
    #[default]
    General,
    OBC,
    SC,
    ST,
    EWS,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Category::General => "General",
            Category::OBC => "OBC",
            Category::SC => "SC",
            Category::ST => "ST",
            Category::EWS => "EWS",
        };
        f.write_str(label)
    }
}

/// The structured description of a farmer, collected via voice or manual
/// form entry. Partial while collection is in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FarmerProfile {
    pub name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    /// Land holding in acres. Never negative.
    pub land_holding: f64,
    pub crop_type: Option<String>,
    pub category: Category,
}

/// A fragment of a profile as produced by one extraction pass or one form
/// edit. Fields left `None` are "not mentioned" and never clobber existing
/// values on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialProfile {
    pub name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub land_holding: Option<f64>,
    pub crop_type: Option<String>,
    pub category: Option<Category>,
}

impl PartialProfile {
    pub fn is_empty(&self) -> bool {
        *self == PartialProfile::default()
    }
}

impl FarmerProfile {
    /// Overlay `partial` onto this profile. Right-biased: a defined field in
    /// `partial` wins, an undefined field leaves the current value alone.
    pub fn merge(&mut self, partial: PartialProfile) {
        if let Some(name) = partial.name {
            self.name = Some(name);
        }
        if let Some(state) = partial.state {
            self.state = Some(state);
        }
        if let Some(district) = partial.district {
            self.district = Some(district);
        }
        if let Some(land_holding) = partial.land_holding {
            self.land_holding = land_holding.max(0.0);
        }
        if let Some(crop_type) = partial.crop_type {
            self.crop_type = Some(crop_type);
        }
        if let Some(category) = partial.category {
            self.category = category;
        }
    }

    /// Snapshot of this profile as a partial, useful for idempotent re-merge.
    pub fn as_partial(&self) -> PartialProfile {
        PartialProfile {
            name: self.name.clone(),
            state: self.state.clone(),
            district: self.district.clone(),
            land_holding: Some(self.land_holding),
            crop_type: self.crop_type.clone(),
            category: Some(self.category),
        }
    }
}
