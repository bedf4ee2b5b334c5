//! Lifecycle stages.
//!
//! The lifecycle is a single ordered line of stages. Moving up the line is
//! the forward direction (start network, log in, start and join sessions),
//! moving down is the teardown direction. Teardown names such as
//! `SessionLeft` do not introduce new stages: they name the stage that is
//! reached when arriving from above, so `SessionLeft` and `SessionStartedUp`
//! are the same stage seen from different directions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter};

/// Direction of travel along the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

/// One stage of the lifecycle, ordered by its ordinal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumIter,
    EnumCount,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum State {
    #[default]
    NotInitialized = 0,
    NetworkStartedUp = 1,
    LoggedIn = 2,
    SessionInitialized = 3,
    SessionStartedUp = 4,
    SessionJoined = 5,
    JointSessionJoined = 6,
    SessionStartedBrowseMatchmake = 7,
}

const FORWARD_NAMES: [&str; State::COUNT] = [
    "NotInitialized",
    "NetworkStartedUp",
    "LoggedIn",
    "SessionInitialized",
    "SessionStartedUp",
    "SessionJoined",
    "JointSessionJoined",
    "SessionStartedBrowseMatchmake",
];

// Stage reached when tearing down from the stage above it.
const BACKWARD_NAMES: [&str; State::COUNT] = [
    "NetworkCleanedUp",
    "LoggedOut",
    "SessionFinalized",
    "SessionCleanedUp",
    "SessionLeft",
    "JointSessionLeft",
    "SessionStoppedBrowseMatchmake",
    "SessionStartedBrowseMatchmake",
];

impl State {
    /// Teardown alias of [`State::NotInitialized`].
    pub const NETWORK_CLEANED_UP: State = State::NotInitialized;
    /// Teardown alias of [`State::NetworkStartedUp`].
    pub const LOGGED_OUT: State = State::NetworkStartedUp;
    /// Teardown alias of [`State::LoggedIn`].
    pub const SESSION_FINALIZED: State = State::LoggedIn;
    /// Teardown alias of [`State::SessionInitialized`].
    pub const SESSION_CLEANED_UP: State = State::SessionInitialized;
    /// Teardown alias of [`State::SessionStartedUp`].
    pub const SESSION_LEFT: State = State::SessionStartedUp;
    /// Teardown alias of [`State::SessionJoined`].
    pub const JOINT_SESSION_LEFT: State = State::SessionJoined;
    /// Teardown alias of [`State::JointSessionJoined`].
    pub const SESSION_STOPPED_BROWSE_MATCHMAKE: State = State::JointSessionJoined;

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub const fn from_ordinal(ordinal: u8) -> Option<State> {
        Some(match ordinal {
            0 => State::NotInitialized,
            1 => State::NetworkStartedUp,
            2 => State::LoggedIn,
            3 => State::SessionInitialized,
            4 => State::SessionStartedUp,
            5 => State::SessionJoined,
            6 => State::JointSessionJoined,
            7 => State::SessionStartedBrowseMatchmake,
            _ => return None,
        })
    }

    /// Neighbouring stage in `direction`, if any.
    pub const fn next(self, direction: Direction) -> Option<State> {
        match direction {
            Direction::Forward => State::from_ordinal(self.ordinal() + 1),
            Direction::Backward => match self.ordinal() {
                0 => None,
                n => State::from_ordinal(n - 1),
            },
        }
    }

    /// Direction needed to reach `target`, or `None` when already there.
    pub fn direction_to(self, target: State) -> Option<Direction> {
        match target.cmp(&self) {
            core::cmp::Ordering::Greater => Some(Direction::Forward),
            core::cmp::Ordering::Less => Some(Direction::Backward),
            core::cmp::Ordering::Equal => None,
        }
    }

    /// Name of the stage as seen when arriving in `direction`.
    pub fn label(self, direction: Direction) -> &'static str {
        let index = self.ordinal() as usize;
        match direction {
            Direction::Forward => FORWARD_NAMES[index],
            Direction::Backward => BACKWARD_NAMES[index],
        }
    }

    /// A session (not necessarily a joint session) is joined.
    pub fn has_session(self) -> bool {
        self >= State::SessionJoined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn aliases_share_stage() {
        assert_eq!(State::SESSION_LEFT, State::SessionStartedUp);
        assert_eq!(State::SESSION_LEFT.ordinal(), 4);
        assert_eq!(State::NETWORK_CLEANED_UP, State::NotInitialized);
        assert_eq!(State::LOGGED_OUT.label(Direction::Backward), "LoggedOut");
        assert_eq!(
            State::SessionStartedUp.label(Direction::Forward),
            "SessionStartedUp"
        );
    }

    #[test]
    fn ordinals_roundtrip() {
        for state in State::iter() {
            assert_eq!(State::from_ordinal(state.ordinal()), Some(state));
        }
        assert_eq!(State::from_ordinal(8), None);
    }

    #[test]
    fn neighbours_stop_at_ends() {
        assert_eq!(State::NotInitialized.next(Direction::Backward), None);
        assert_eq!(
            State::SessionStartedBrowseMatchmake.next(Direction::Forward),
            None
        );
        assert_eq!(
            State::SessionStartedUp.next(Direction::Forward),
            Some(State::SessionJoined)
        );
        assert_eq!(
            State::SessionJoined.direction_to(State::SESSION_LEFT),
            Some(Direction::Backward)
        );
        assert_eq!(State::LoggedIn.direction_to(State::LoggedIn), None);
    }
}
