use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{NavEvent, NavigationSystem};
use crate::nav::types::Position;

/// Collaborator request to send an agent somewhere.
#[derive(Message, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRequest {
    pub entity: Entity,
    pub goal: Position,
}

pub fn apply_destination_requests(
    mut requests: MessageReader<DestinationRequest>,
    mut nav: ResMut<NavigationSystem>,
) {
    for request in requests.read() {
        if !nav.set_destination(request.entity, request.goal) {
            warn!("[NAV] Destination for unknown agent {:?} ignored", request.entity);
        }
    }
}

/// One navigation tick per fixed step.
pub fn advance_navigation(mut nav: ResMut<NavigationSystem>) {
    nav.advance(1);
}

pub fn publish_nav_events(mut nav: ResMut<NavigationSystem>, mut events: MessageWriter<NavEvent>) {
    for event in nav.drain_events() {
        events.write(event);
    }
}
