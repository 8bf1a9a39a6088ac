//! Connection-request state machine.
//!
//! Every transition validates first and mutates after, so a failed call leaves both records
//! untouched. Persistence is the caller's job (see [`crate::users::Users::update_pair`]).

use devmatch_common::UserId;
use thiserror::Error;

use crate::users::User;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("Cannot target yourself")]
    SelfReference,

    #[error("No pending request from this user")]
    NotFound,

    #[error("{0}")]
    Duplicate(&'static str),
}

pub fn check_distinct(actor: &UserId, target: &UserId) -> Result<(), RelationError> {
    if actor == target {
        return Err(RelationError::SelfReference);
    }
    Ok(())
}

/// Actor asks to connect with target. Mirrored: actor gains a sent request, target a received one.
/// Reaching out supersedes an earlier ignore of the target.
pub fn send_interest(actor: &mut User, target: &mut User) -> Result<(), RelationError> {
    check_distinct(&actor.id, &target.id)?;
    if actor.relations.sent_requests.contains(&target.id) {
        return Err(RelationError::Duplicate("Request already sent"));
    }
    if actor.relations.connections.contains(&target.id) {
        return Err(RelationError::Duplicate("Already connected"));
    }
    actor.relations.ignored_requests.remove(&target.id);
    actor.relations.sent_requests.insert(target.id.clone());
    target.relations.received_requests.insert(actor.id.clone());
    Ok(())
}

/// Unilateral: only the actor's record changes.
pub fn ignore(actor: &mut User, target: &UserId) -> Result<(), RelationError> {
    check_distinct(&actor.id, target)?;
    let rel = &actor.relations;
    if rel.ignored_requests.contains(target) {
        return Err(RelationError::Duplicate("User already ignored"));
    }
    if rel.sent_requests.contains(target) {
        return Err(RelationError::Duplicate("Request already sent to this user"));
    }
    if rel.connections.contains(target) {
        return Err(RelationError::Duplicate("Already connected"));
    }
    actor.relations.ignored_requests.insert(target.clone());
    Ok(())
}

/// Connecting drops any ignore either side holds against the other.
pub fn accept_request(actor: &mut User, requester: &mut User) -> Result<(), RelationError> {
    clear_pending(actor, requester)?;
    actor.relations.ignored_requests.remove(&requester.id);
    requester.relations.ignored_requests.remove(&actor.id);
    actor.relations.connections.insert(requester.id.clone());
    requester.relations.connections.insert(actor.id.clone());
    Ok(())
}

pub fn reject_request(actor: &mut User, requester: &mut User) -> Result<(), RelationError> {
    clear_pending(actor, requester)
}

// Pending pair goes first so no transition leaves an orphaned half behind.
fn clear_pending(actor: &mut User, requester: &mut User) -> Result<(), RelationError> {
    check_distinct(&actor.id, &requester.id)?;
    if !actor.relations.received_requests.contains(&requester.id) {
        return Err(RelationError::NotFound);
    }
    actor.relations.received_requests.remove(&requester.id);
    requester.relations.sent_requests.remove(&actor.id);
    Ok(())
}
