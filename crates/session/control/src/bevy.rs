//! Bevy ECS integration.
//!
//! The context lives in a [`SessionControl`] resource. [`dispatch_session`]
//! steps it once per frame and forwards drained session events as
//! [`SessionEventMessage`]s. Schedule it in [`SessionDispatch`].

use std::ops::{Deref, DerefMut};

use bevy_ecs::prelude::*;
use session_shared::SessionEvent;

use crate::context::SessionContext;
use crate::engine::SessionEngine;

#[derive(Resource)]
pub struct SessionControl<E>(pub SessionContext<E>);

impl<E> Deref for SessionControl<E> {
    type Target = SessionContext<E>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> DerefMut for SessionControl<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A session event surfaced to gameplay systems.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEventMessage(pub SessionEvent);

/// System set in which the session context is dispatched.
///
/// Systems reading [`SessionEventMessage`]s or polling operations should run
/// after it.
#[derive(Debug, SystemSet, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionDispatch;

pub fn dispatch_session<E>(
    mut control: ResMut<SessionControl<E>>,
    mut events: EventWriter<SessionEventMessage>,
) where
    E: SessionEngine + Send + Sync + 'static,
{
    control.dispatch();
    for event in control.drain_events() {
        events.write(SessionEventMessage(event));
    }
}
