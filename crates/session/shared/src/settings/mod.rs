//! Settings objects handed to the engine when creating, searching, updating
//! or joining sessions.
//!
//! Optional fields are `Option<T>` members; a field is "set" exactly when it
//! holds a value. [`FieldMask`] exposes that presence to the engine so it can
//! tell "not specified" from "specified as zero".
//!
//! Bounded values (passwords, keywords, attribute lists, application data)
//! are validated when they are set. A rejected value leaves the object
//! untouched. Numeric fields such as participant counts are not validated
//! here; the engine rejects illegal values on submission.
//!
//! Attributes and a matchmake keyword are mutually exclusive per object:
//! whichever is set first wins, and setting the other one fails.

mod create;
mod join;
mod joint;
mod search;
mod update;

use core::{fmt, marker::PhantomData};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::result::EngineResult;

pub use create::{CreateSessionField, CreateSessionSetting};
pub use join::{
    JoinRandomSessionField, JoinRandomSessionSetting, JoinSessionField, JoinSessionSetting,
};
pub use joint::{
    CreateJointSessionField, CreateJointSessionSetting, UpdateJointSessionField,
    UpdateJointSessionSetting,
};
pub use search::{ParticipantRange, ResultRange, SearchField, SessionSearchCriteria};
pub use update::{UpdateSessionField, UpdateSessionSetting};

/// Maximum length of a session user password, in bytes.
pub const USER_PASSWORD_LENGTH_MAX: usize = 8;
/// Maximum length of a matchmake keyword, in bytes.
pub const MATCHMAKE_KEYWORD_LENGTH_MAX: usize = 128;
/// Maximum number of attributes per settings object.
pub const ATTRIBUTE_COUNT_MAX: usize = 6;
/// Maximum size of application data attached to a session.
pub const APPLICATION_DATA_SIZE_MAX: usize = 256;
/// Maximum number of search criteria in a join-random request.
pub const SEARCH_CRITERIA_COUNT_MAX: usize = 4;

/// Value of a session attribute.
pub type AttributeValue = u32;

/// Attribute filter used in search criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeMatch {
    Exact(AttributeValue),
    Range {
        min: AttributeValue,
        max: AttributeValue,
    },
}

impl AttributeMatch {
    pub fn matches(&self, value: AttributeValue) -> bool {
        match *self {
            AttributeMatch::Exact(v) => v == value,
            AttributeMatch::Range { min, max } => (min..=max).contains(&value),
        }
    }
}

/// Either an attribute list or a matchmake keyword, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchmakeFilter<A> {
    Attributes(Vec<A>),
    Keyword(String),
}

impl<A> MatchmakeFilter<A> {
    pub fn attributes(&self) -> Option<&[A]> {
        match self {
            MatchmakeFilter::Attributes(list) => Some(list),
            MatchmakeFilter::Keyword(_) => None,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            MatchmakeFilter::Keyword(keyword) => Some(keyword),
            MatchmakeFilter::Attributes(_) => None,
        }
    }
}

/// A field of a settings object that can be reported in a [`FieldMask`].
pub trait SettingField: Copy + Eq + fmt::Debug + IntoEnumIterator {
    fn bit(self) -> u32;
}

macro_rules! impl_setting_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::settings::SettingField for $ty {
                fn bit(self) -> u32 {
                    1 << (self as u32)
                }
            }
        )*
    };
}
pub(crate) use impl_setting_field;

/// Set of explicitly assigned fields of one settings type.
pub struct FieldMask<F> {
    bits: u32,
    _field: PhantomData<F>,
}

impl<F: SettingField> FieldMask<F> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _field: PhantomData,
        }
    }

    /// Adds `field` when `present` holds.
    pub fn with(mut self, field: F, present: bool) -> Self {
        if present {
            self.bits |= field.bit();
        }
        self
    }

    pub fn contains(&self, field: F) -> bool {
        self.bits & field.bit() != 0
    }

    pub const fn bits(&self) -> u32 {
        self.bits
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::iter().filter(move |field| self.contains(*field))
    }
}

impl<F> Clone for FieldMask<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for FieldMask<F> {}

impl<F> PartialEq for FieldMask<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F> Eq for FieldMask<F> {}

impl<F: SettingField> Default for FieldMask<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: SettingField> fmt::Debug for FieldMask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Non-empty, NUL-free and at most `max` bytes.
pub(crate) fn check_text(value: &str, max: usize) -> EngineResult {
    if value.is_empty() || value.len() > max || value.contains('\0') {
        return EngineResult::invalid_argument();
    }
    EngineResult::success()
}

pub(crate) fn check_application_data(data: &[u8]) -> EngineResult {
    if data.len() > APPLICATION_DATA_SIZE_MAX {
        return EngineResult::invalid_argument();
    }
    EngineResult::success()
}

pub(crate) fn set_filter_attributes<A: Clone>(
    slot: &mut Option<MatchmakeFilter<A>>,
    attributes: &[A],
) -> EngineResult {
    if matches!(slot, Some(MatchmakeFilter::Keyword(_))) {
        return EngineResult::invalid_argument();
    }
    if attributes.is_empty() || attributes.len() > ATTRIBUTE_COUNT_MAX {
        return EngineResult::invalid_argument();
    }
    *slot = Some(MatchmakeFilter::Attributes(attributes.to_vec()));
    EngineResult::success()
}

pub(crate) fn set_filter_keyword<A>(
    slot: &mut Option<MatchmakeFilter<A>>,
    keyword: &str,
) -> EngineResult {
    if matches!(slot, Some(MatchmakeFilter::Attributes(_))) {
        return EngineResult::invalid_argument();
    }
    let checked = check_text(keyword, MATCHMAKE_KEYWORD_LENGTH_MAX);
    if checked.is_failure() {
        return checked;
    }
    *slot = Some(MatchmakeFilter::Keyword(keyword.to_owned()));
    EngineResult::success()
}
