use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{check_application_data, impl_setting_field, FieldMask};
use crate::result::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum CreateJointSessionField {
    MaxParticipants,
    ApplicationData,
    OpenOnCreate,
}

impl_setting_field!(CreateJointSessionField);

/// Parameters for grouping the current session into a joint session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJointSessionSetting {
    max_participants: Option<u16>,
    application_data: Option<Vec<u8>>,
    open_on_create: Option<bool>,
}

impl CreateJointSessionSetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_participants(&mut self, count: u16) {
        self.max_participants = Some(count);
    }

    pub fn set_open_on_create(&mut self, open: bool) {
        self.open_on_create = Some(open);
    }

    pub fn set_application_data(&mut self, data: &[u8]) -> EngineResult {
        let checked = check_application_data(data);
        if checked.is_success() {
            self.application_data = Some(data.to_vec());
        }
        checked
    }

    pub fn max_participants(&self) -> Option<u16> {
        self.max_participants
    }

    pub fn open_on_create(&self) -> Option<bool> {
        self.open_on_create
    }

    pub fn application_data(&self) -> Option<&[u8]> {
        self.application_data.as_deref()
    }

    pub fn presence(&self) -> FieldMask<CreateJointSessionField> {
        FieldMask::empty()
            .with(
                CreateJointSessionField::MaxParticipants,
                self.max_participants.is_some(),
            )
            .with(
                CreateJointSessionField::ApplicationData,
                self.application_data.is_some(),
            )
            .with(
                CreateJointSessionField::OpenOnCreate,
                self.open_on_create.is_some(),
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum UpdateJointSessionField {
    MaxParticipants,
    ApplicationData,
    Opened,
}

impl_setting_field!(UpdateJointSessionField);

/// Changes applied to the current joint session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateJointSessionSetting {
    max_participants: Option<u16>,
    application_data: Option<Vec<u8>>,
    opened: Option<bool>,
}

impl UpdateJointSessionSetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_participants(&mut self, count: u16) {
        self.max_participants = Some(count);
    }

    pub fn set_opened(&mut self, opened: bool) {
        self.opened = Some(opened);
    }

    pub fn set_application_data(&mut self, data: &[u8]) -> EngineResult {
        let checked = check_application_data(data);
        if checked.is_success() {
            self.application_data = Some(data.to_vec());
        }
        checked
    }

    pub fn max_participants(&self) -> Option<u16> {
        self.max_participants
    }

    pub fn opened(&self) -> Option<bool> {
        self.opened
    }

    pub fn application_data(&self) -> Option<&[u8]> {
        self.application_data.as_deref()
    }

    pub fn presence(&self) -> FieldMask<UpdateJointSessionField> {
        FieldMask::empty()
            .with(
                UpdateJointSessionField::MaxParticipants,
                self.max_participants.is_some(),
            )
            .with(
                UpdateJointSessionField::ApplicationData,
                self.application_data.is_some(),
            )
            .with(UpdateJointSessionField::Opened, self.opened.is_some())
    }
}
