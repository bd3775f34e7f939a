use cce_types::models::User;
use cce_types::survey::{
    MAX_RATING, Organization, REQUIRED_ATTRIBUTES, RankedAttribute, Ratings, ServiceExperience,
    VariabilityAssessment, VariabilityKind, DEFAULT_RATING,
};
use thiserror::Error;
use uuid::Uuid;

use crate::policy::{SubmissionDenied, submission_gate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Denied(#[from] SubmissionDenied),

    #[error("step {step} is incomplete: {reason}")]
    Incomplete { step: u8, reason: &'static str },

    #[error("a report ranks exactly six attributes")]
    AttributeLimit,

    #[error("attribute name must not be blank")]
    BlankAttribute,

    #[error("attribute {0:?} was already added")]
    DuplicateAttribute(String),

    #[error("unknown attribute {0}")]
    UnknownAttribute(Uuid),

    #[error("position {0} is out of range")]
    PositionOutOfRange(usize),

    #[error("rating {0} is above the maximum of 100")]
    RatingOutOfRange(u8),

    #[error("cannot advance past step {0}")]
    BlockedAt(u8),
}

/// Wizard steps in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Organization,
    Attributes,
    Performance,
    Variability,
    Ratings,
    Narrative,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Organization,
        Step::Attributes,
        Step::Performance,
        Step::Variability,
        Step::Ratings,
        Step::Narrative,
    ];

    /// 1-based step number as shown to students.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn next(self) -> Option<Step> {
        Self::ALL.get(self as usize + 1).copied()
    }

    pub fn prev(self) -> Option<Step> {
        (self as usize).checked_sub(1).map(|i| Self::ALL[i])
    }
}

/// Checks the gate of a single step against an experience.
pub fn check_step(experience: &ServiceExperience, step: Step) -> Result<(), SurveyError> {
    let incomplete = |reason| SurveyError::Incomplete { step: step.number(), reason };

    match step {
        Step::Organization => {
            let org = &experience.organization;
            let fields = [
                &org.organization_name,
                &org.organization_type,
                &org.service_type,
                &org.service_date,
            ];
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(incomplete("all organization fields are required"));
            }
        }
        Step::Attributes => {
            if experience.attributes.len() != REQUIRED_ATTRIBUTES {
                return Err(incomplete("exactly six attributes are required"));
            }
        }
        Step::Performance => {
            if experience.attributes.len() != REQUIRED_ATTRIBUTES {
                return Err(incomplete("exactly six attributes are required"));
            }
            if experience
                .attributes
                .iter()
                .any(|a| a.performance_rating > MAX_RATING)
            {
                return Err(incomplete("every attribute needs a rating between 0 and 100"));
            }
        }
        Step::Variability => {}
        Step::Ratings => {
            let r = &experience.ratings;
            if [r.overall_satisfaction, r.compatibility, r.likelihood_to_return]
                .iter()
                .any(|v| *v > MAX_RATING)
            {
                return Err(incomplete("ratings must be between 0 and 100"));
            }
        }
        Step::Narrative => {
            if experience.narrative.trim().is_empty() || experience.lesson.trim().is_empty() {
                return Err(incomplete("narrative and lesson are required"));
            }
        }
    }

    Ok(())
}

/// Renumbers rankings from list position and keeps one assessment per
/// variability type (the last one given wins).
pub fn normalize(experience: &mut ServiceExperience) {
    renumber(&mut experience.attributes);

    let mut kept: Vec<VariabilityAssessment> = Vec::with_capacity(VariabilityKind::ALL.len());
    for assessment in experience.variability.drain(..) {
        kept.retain(|v| v.kind != assessment.kind);
        kept.push(assessment);
    }
    kept.sort_by_key(|v| VariabilityKind::ALL.iter().position(|k| *k == v.kind));
    experience.variability = kept;

    experience.media_links.retain(|l| !l.trim().is_empty());
}

/// Server-side re-check of every step gate.
pub fn validate_experience(experience: &ServiceExperience) -> Result<(), SurveyError> {
    for step in Step::ALL {
        check_step(experience, step)?;
    }
    Ok(())
}

fn renumber(attributes: &mut [RankedAttribute]) {
    for (i, attr) in attributes.iter_mut().enumerate() {
        attr.user_ranking = (i + 1) as u8;
    }
}

/// Accumulates a report across the six wizard steps.
#[derive(Debug, Clone)]
pub struct SurveyDraft {
    step: Step,
    experience: ServiceExperience,
}

impl Default for SurveyDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyDraft {
    pub fn new() -> Self {
        Self {
            step: Step::Organization,
            experience: ServiceExperience::default(),
        }
    }

    /// Reopens a saved report for editing, starting at step 1.
    pub fn from_experience(mut experience: ServiceExperience) -> Self {
        normalize(&mut experience);
        Self {
            step: Step::Organization,
            experience,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn experience(&self) -> &ServiceExperience {
        &self.experience
    }

    pub fn can_proceed(&self) -> bool {
        check_step(&self.experience, self.step).is_ok()
    }

    pub fn next(&mut self) -> Result<Step, SurveyError> {
        check_step(&self.experience, self.step)?;
        let next = self.step.next().ok_or(SurveyError::BlockedAt(self.step.number()))?;
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> Step {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    pub fn set_organization(&mut self, organization: Organization) {
        self.experience.organization = organization;
    }

    pub fn add_attribute(&mut self, name: &str) -> Result<Uuid, SurveyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SurveyError::BlankAttribute);
        }
        if self.experience.attributes.len() >= REQUIRED_ATTRIBUTES {
            return Err(SurveyError::AttributeLimit);
        }
        if self
            .experience
            .attributes
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
        {
            return Err(SurveyError::DuplicateAttribute(name.to_string()));
        }

        let id = Uuid::new_v4();
        self.experience.attributes.push(RankedAttribute {
            id,
            name: name.to_string(),
            user_ranking: 0,
            performance_rating: DEFAULT_RATING,
        });
        renumber(&mut self.experience.attributes);
        Ok(id)
    }

    pub fn remove_attribute(&mut self, id: Uuid) -> Result<(), SurveyError> {
        let pos = self.position_of(id)?;
        self.experience.attributes.remove(pos);
        renumber(&mut self.experience.attributes);
        Ok(())
    }

    /// Drag-and-drop reorder: moves the attribute at `from` to `to` (0-based).
    pub fn move_attribute(&mut self, from: usize, to: usize) -> Result<(), SurveyError> {
        let len = self.experience.attributes.len();
        if from >= len {
            return Err(SurveyError::PositionOutOfRange(from));
        }
        if to >= len {
            return Err(SurveyError::PositionOutOfRange(to));
        }
        let attr = self.experience.attributes.remove(from);
        self.experience.attributes.insert(to, attr);
        renumber(&mut self.experience.attributes);
        Ok(())
    }

    /// Explicit rank selection: places the attribute at `rank` (1-based).
    pub fn set_rank(&mut self, id: Uuid, rank: u8) -> Result<(), SurveyError> {
        let from = self.position_of(id)?;
        let to = (rank as usize)
            .checked_sub(1)
            .ok_or(SurveyError::PositionOutOfRange(0))?;
        self.move_attribute(from, to)
    }

    pub fn set_performance(&mut self, id: Uuid, rating: u8) -> Result<(), SurveyError> {
        if rating > MAX_RATING {
            return Err(SurveyError::RatingOutOfRange(rating));
        }
        let pos = self.position_of(id)?;
        self.experience.attributes[pos].performance_rating = rating;
        Ok(())
    }

    /// Records the assessment for its variability type, replacing any earlier one.
    pub fn set_variability(&mut self, assessment: VariabilityAssessment) {
        self.experience.variability.push(assessment);
        normalize(&mut self.experience);
    }

    pub fn set_ratings(&mut self, ratings: Ratings) -> Result<(), SurveyError> {
        for v in [
            ratings.overall_satisfaction,
            ratings.compatibility,
            ratings.likelihood_to_return,
        ] {
            if v > MAX_RATING {
                return Err(SurveyError::RatingOutOfRange(v));
            }
        }
        self.experience.ratings = ratings;
        Ok(())
    }

    pub fn set_narrative(&mut self, narrative: &str, lesson: &str) {
        self.experience.narrative = narrative.to_string();
        self.experience.lesson = lesson.to_string();
    }

    pub fn add_media_link(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.experience.media_links.push(url.to_string());
        }
    }

    /// Completed report, with every step gate passed. Used when editing.
    pub fn finish(&self) -> Result<ServiceExperience, SurveyError> {
        let mut experience = self.experience.clone();
        normalize(&mut experience);
        validate_experience(&experience)?;
        Ok(experience)
    }

    /// Completed report for a new post. The creation gate runs first so a
    /// blocked student never reaches a write.
    pub fn submit(
        &self,
        user: Option<&User>,
        existing_posts: usize,
    ) -> Result<ServiceExperience, SurveyError> {
        submission_gate(user, existing_posts)?;
        self.finish()
    }

    fn position_of(&self, id: Uuid) -> Result<usize, SurveyError> {
        self.experience
            .attributes
            .iter()
            .position(|a| a.id == id)
            .ok_or(SurveyError::UnknownAttribute(id))
    }
}
