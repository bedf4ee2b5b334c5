use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{
    impl_setting_field, set_filter_attributes, set_filter_keyword, AttributeMatch, FieldMask,
    MatchmakeFilter,
};
use crate::result::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum SearchField {
    MinParticipants,
    MaxParticipants,
    GameMode,
    Attribute,
    MatchmakeKeyword,
    VacantOnly,
    ExcludeLocked,
    ExcludeUserPasswordSet,
    ResultRange,
}

impl_setting_field!(SearchField);

/// Inclusive participant-count range. Not validated; the engine decides
/// whether `min > max` is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantRange {
    pub min: u16,
    pub max: u16,
}

impl ParticipantRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u16) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Window into the search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultRange {
    pub offset: u16,
    pub size: u16,
}

/// Criteria used to browse for sessions or to pick one in a join-random request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSearchCriteria {
    min_participants: Option<ParticipantRange>,
    max_participants: Option<ParticipantRange>,
    game_mode: Option<u32>,
    filter: Option<MatchmakeFilter<AttributeMatch>>,
    vacant_only: Option<bool>,
    exclude_locked: Option<bool>,
    exclude_user_password_set: Option<bool>,
    result_range: Option<ResultRange>,
}

impl SessionSearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_min_participants(&mut self, min: u16, max: u16) {
        self.min_participants = Some(ParticipantRange::new(min, max));
    }

    pub fn set_max_participants(&mut self, min: u16, max: u16) {
        self.max_participants = Some(ParticipantRange::new(min, max));
    }

    pub fn set_game_mode(&mut self, game_mode: u32) {
        self.game_mode = Some(game_mode);
    }

    pub fn set_vacant_only(&mut self, vacant_only: bool) {
        self.vacant_only = Some(vacant_only);
    }

    pub fn set_exclude_locked(&mut self, exclude: bool) {
        self.exclude_locked = Some(exclude);
    }

    pub fn set_exclude_user_password_set(&mut self, exclude: bool) {
        self.exclude_user_password_set = Some(exclude);
    }

    pub fn set_result_range(&mut self, offset: u16, size: u16) {
        self.result_range = Some(ResultRange { offset, size });
    }

    /// Fails when a matchmake keyword is already set.
    pub fn set_attribute_list(&mut self, attributes: &[AttributeMatch]) -> EngineResult {
        set_filter_attributes(&mut self.filter, attributes)
    }

    /// Fails when an attribute list is already set.
    pub fn set_matchmake_keyword(&mut self, keyword: &str) -> EngineResult {
        set_filter_keyword(&mut self.filter, keyword)
    }

    pub fn min_participants(&self) -> Option<ParticipantRange> {
        self.min_participants
    }

    pub fn max_participants(&self) -> Option<ParticipantRange> {
        self.max_participants
    }

    pub fn game_mode(&self) -> Option<u32> {
        self.game_mode
    }

    pub fn attributes(&self) -> Option<&[AttributeMatch]> {
        self.filter.as_ref().and_then(MatchmakeFilter::attributes)
    }

    pub fn matchmake_keyword(&self) -> Option<&str> {
        self.filter.as_ref().and_then(MatchmakeFilter::keyword)
    }

    pub fn vacant_only(&self) -> Option<bool> {
        self.vacant_only
    }

    pub fn exclude_locked(&self) -> Option<bool> {
        self.exclude_locked
    }

    pub fn exclude_user_password_set(&self) -> Option<bool> {
        self.exclude_user_password_set
    }

    pub fn result_range(&self) -> Option<ResultRange> {
        self.result_range
    }

    pub fn presence(&self) -> FieldMask<SearchField> {
        use SearchField::*;
        FieldMask::empty()
            .with(MinParticipants, self.min_participants.is_some())
            .with(MaxParticipants, self.max_participants.is_some())
            .with(GameMode, self.game_mode.is_some())
            .with(Attribute, self.attributes().is_some())
            .with(MatchmakeKeyword, self.matchmake_keyword().is_some())
            .with(VacantOnly, self.vacant_only.is_some())
            .with(ExcludeLocked, self.exclude_locked.is_some())
            .with(ExcludeUserPasswordSet, self.exclude_user_password_set.is_some())
            .with(ResultRange, self.result_range.is_some())
    }

    pub fn is_set(&self, field: SearchField) -> bool {
        self.presence().contains(field)
    }
}
