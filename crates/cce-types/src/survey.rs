use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of attributes every report ranks.
pub const REQUIRED_ATTRIBUTES: usize = 6;

/// Neutral slider position used for untouched ratings.
pub const DEFAULT_RATING: u8 = 50;

pub const MAX_RATING: u8 = 100;

fn default_rating() -> u8 {
    DEFAULT_RATING
}

/// Structured survey payload attached to a post.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceExperience {
    pub organization: Organization,
    pub attributes: Vec<RankedAttribute>,
    pub variability: Vec<VariabilityAssessment>,
    pub ratings: Ratings,
    pub narrative: String,
    pub lesson: String,
    pub media_links: Vec<String>,
}

impl ServiceExperience {
    /// Assessment for `kind`, if the student filled one in.
    pub fn assessment(&self, kind: VariabilityKind) -> Option<&VariabilityAssessment> {
        self.variability.iter().find(|v| v.kind == kind)
    }

    /// Attribute holding rank `rank` (1-based).
    pub fn attribute_at_rank(&self, rank: u8) -> Option<&RankedAttribute> {
        self.attributes.iter().find(|a| a.user_ranking == rank)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub organization_name: String,
    pub organization_type: String,
    pub service_type: String,
    pub service_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAttribute {
    pub id: Uuid,
    pub name: String,
    /// 1 = most important. Always equals position + 1 in the attribute list.
    pub user_ranking: u8,
    #[serde(default = "default_rating")]
    pub performance_rating: u8,
}

/// The five customer-introduced variability types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariabilityKind {
    Arrival,
    Request,
    Capability,
    Effort,
    SubjectivePreference,
}

impl VariabilityKind {
    pub const ALL: [VariabilityKind; 5] = [
        VariabilityKind::Arrival,
        VariabilityKind::Request,
        VariabilityKind::Capability,
        VariabilityKind::Effort,
        VariabilityKind::SubjectivePreference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Request => "request",
            Self::Capability => "capability",
            Self::Effort => "effort",
            Self::SubjectivePreference => "subjective_preference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariabilityAssessment {
    pub kind: VariabilityKind,
    #[serde(default)]
    pub present: bool,
    #[serde(default)]
    pub description: String,
    /// How the organization accommodated or reduced the variability.
    #[serde(default)]
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratings {
    pub overall_satisfaction: u8,
    pub compatibility: u8,
    pub likelihood_to_return: u8,
}

impl Default for Ratings {
    fn default() -> Self {
        Self {
            overall_satisfaction: DEFAULT_RATING,
            compatibility: DEFAULT_RATING,
            likelihood_to_return: DEFAULT_RATING,
        }
    }
}
