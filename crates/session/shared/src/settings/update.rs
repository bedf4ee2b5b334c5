use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{
    check_application_data, check_text, impl_setting_field, set_filter_attributes,
    set_filter_keyword, AttributeValue, FieldMask, MatchmakeFilter, USER_PASSWORD_LENGTH_MAX,
};
use crate::result::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum UpdateSessionField {
    MinParticipants,
    MaxParticipants,
    GameMode,
    Attribute,
    MatchmakeKeyword,
    UserPassword,
    ApplicationData,
    Opened,
}

impl_setting_field!(UpdateSessionField);

/// Changes applied to the joined session. Only fields that were set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSessionSetting {
    min_participants: Option<u16>,
    max_participants: Option<u16>,
    game_mode: Option<u32>,
    filter: Option<MatchmakeFilter<AttributeValue>>,
    user_password: Option<String>,
    application_data: Option<Vec<u8>>,
    opened: Option<bool>,
}

impl UpdateSessionSetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_min_participants(&mut self, count: u16) {
        self.min_participants = Some(count);
    }

    pub fn set_max_participants(&mut self, count: u16) {
        self.max_participants = Some(count);
    }

    pub fn set_game_mode(&mut self, game_mode: u32) {
        self.game_mode = Some(game_mode);
    }

    pub fn set_opened(&mut self, opened: bool) {
        self.opened = Some(opened);
    }

    pub fn set_attribute_list(&mut self, attributes: &[AttributeValue]) -> EngineResult {
        set_filter_attributes(&mut self.filter, attributes)
    }

    pub fn set_matchmake_keyword(&mut self, keyword: &str) -> EngineResult {
        set_filter_keyword(&mut self.filter, keyword)
    }

    pub fn set_user_password(&mut self, password: &str) -> EngineResult {
        let checked = check_text(password, USER_PASSWORD_LENGTH_MAX);
        if checked.is_success() {
            self.user_password = Some(password.to_owned());
        }
        checked
    }

    pub fn set_application_data(&mut self, data: &[u8]) -> EngineResult {
        let checked = check_application_data(data);
        if checked.is_success() {
            self.application_data = Some(data.to_vec());
        }
        checked
    }

    pub fn min_participants(&self) -> Option<u16> {
        self.min_participants
    }

    pub fn max_participants(&self) -> Option<u16> {
        self.max_participants
    }

    pub fn game_mode(&self) -> Option<u32> {
        self.game_mode
    }

    pub fn opened(&self) -> Option<bool> {
        self.opened
    }

    pub fn attributes(&self) -> Option<&[AttributeValue]> {
        self.filter.as_ref().and_then(MatchmakeFilter::attributes)
    }

    pub fn matchmake_keyword(&self) -> Option<&str> {
        self.filter.as_ref().and_then(MatchmakeFilter::keyword)
    }

    pub fn user_password(&self) -> Option<&str> {
        self.user_password.as_deref()
    }

    pub fn application_data(&self) -> Option<&[u8]> {
        self.application_data.as_deref()
    }

    pub fn presence(&self) -> FieldMask<UpdateSessionField> {
        use UpdateSessionField::*;
        FieldMask::empty()
            .with(MinParticipants, self.min_participants.is_some())
            .with(MaxParticipants, self.max_participants.is_some())
            .with(GameMode, self.game_mode.is_some())
            .with(Attribute, self.attributes().is_some())
            .with(MatchmakeKeyword, self.matchmake_keyword().is_some())
            .with(UserPassword, self.user_password.is_some())
            .with(ApplicationData, self.application_data.is_some())
            .with(Opened, self.opened.is_some())
    }

    pub fn is_set(&self, field: UpdateSessionField) -> bool {
        self.presence().contains(field)
    }
}
