use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{
    check_text, impl_setting_field, CreateSessionSetting, FieldMask, SessionSearchCriteria,
    SEARCH_CRITERIA_COUNT_MAX, USER_PASSWORD_LENGTH_MAX,
};
use crate::result::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum JoinSessionField {
    SessionId,
    UserPassword,
}

impl_setting_field!(JoinSessionField);

/// Parameters for joining a specific session found by browsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSessionSetting {
    session_id: Option<u32>,
    user_password: Option<String>,
}

impl JoinSessionSetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session_id(&mut self, session_id: u32) {
        self.session_id = Some(session_id);
    }

    pub fn set_user_password(&mut self, password: &str) -> EngineResult {
        let checked = check_text(password, USER_PASSWORD_LENGTH_MAX);
        if checked.is_success() {
            self.user_password = Some(password.to_owned());
        }
        checked
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    pub fn user_password(&self) -> Option<&str> {
        self.user_password.as_deref()
    }

    pub fn presence(&self) -> FieldMask<JoinSessionField> {
        FieldMask::empty()
            .with(JoinSessionField::SessionId, self.session_id.is_some())
            .with(JoinSessionField::UserPassword, self.user_password.is_some())
    }

    pub fn is_set(&self, field: JoinSessionField) -> bool {
        self.presence().contains(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum JoinRandomSessionField {
    SearchCriteria,
    CreateSetting,
}

impl_setting_field!(JoinRandomSessionField);

/// Join any session matching one of the criteria, or create one with the
/// fallback setting when nothing matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRandomSessionSetting {
    criteria: Vec<SessionSearchCriteria>,
    create_setting: Option<CreateSessionSetting>,
}

impl JoinRandomSessionSetting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a criterion. Fails once the list holds
    /// [`SEARCH_CRITERIA_COUNT_MAX`] entries.
    pub fn add_search_criteria(&mut self, criteria: SessionSearchCriteria) -> EngineResult {
        if self.criteria.len() >= SEARCH_CRITERIA_COUNT_MAX {
            return EngineResult::invalid_argument();
        }
        self.criteria.push(criteria);
        EngineResult::success()
    }

    pub fn set_create_setting(&mut self, setting: CreateSessionSetting) {
        self.create_setting = Some(setting);
    }

    pub fn search_criteria(&self) -> &[SessionSearchCriteria] {
        &self.criteria
    }

    pub fn create_setting(&self) -> Option<&CreateSessionSetting> {
        self.create_setting.as_ref()
    }

    pub fn presence(&self) -> FieldMask<JoinRandomSessionField> {
        FieldMask::empty()
            .with(JoinRandomSessionField::SearchCriteria, !self.criteria.is_empty())
            .with(
                JoinRandomSessionField::CreateSetting,
                self.create_setting.is_some(),
            )
    }

    pub fn is_set(&self, field: JoinRandomSessionField) -> bool {
        self.presence().contains(field)
    }
}
