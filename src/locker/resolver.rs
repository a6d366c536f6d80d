//! Record-axis access resolution.
//!
//! [`decide`] folds owner status, KeyBook credentials, session unlocks,
//! bypass privileges, the lock type's in/out rule and the access list into
//! one allow/deny decision plus its side effects. The function is pure; the
//! manager applies event cancellation, notifications and KeyBook
//! invalidation around it.

use crate::host::{Feedback, UserId};
use crate::locker::keybook::{KeyBook, KeyBookOutcome};
use crate::locker::lock::Lock;
use crate::locker::types::{AccessLevel, LockType};

/// What the actor is trying to do with the protected thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    /// Withdraw items from a protected inventory.
    Take,
    /// Deposit items into a protected inventory.
    Put,
    /// Open or close a protected door.
    Door,
    /// Interact with a protected entity.
    EntityInteract,
    /// Interact with a plain protected block.
    BlockInteract,
}

/// Resolution result plus required side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allow: bool,
    pub feedback: Option<Feedback>,
    /// The presented KeyBook must be turned inert and the holder punished.
    pub invalidate_key_book: bool,
    /// A valid KeyBook was used; the owner gets the key-usage notice.
    pub key_book_used: bool,
    /// The actor is not the owner, so NOTIFY_ACCESS applies.
    pub notify_owner: bool,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allow: true,
            feedback: None,
            invalidate_key_book: false,
            key_book_used: false,
            notify_owner: true,
        }
    }

    fn deny(feedback: Feedback) -> Self {
        Self {
            allow: false,
            feedback: Some(feedback),
            invalidate_key_book: false,
            key_book_used: false,
            notify_owner: true,
        }
    }
}

/// Inputs gathered by the caller: merged access entry (lock-scoped wins
/// over owner-global), session unlock state and the actor's privileges.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorState<'a> {
    pub access: Option<AccessLevel>,
    pub unlocked: bool,
    pub key_book: Option<&'a KeyBook>,
    /// `locker.access-other` override.
    pub bypass: bool,
    /// `locker.show-owner` viewing privilege.
    pub show_owner: bool,
}

fn denial_feedback(action: LockAction, lock: &Lock, show_owner: bool) -> Feedback {
    let owner = show_owner.then_some(lock.owner);
    match action {
        LockAction::Take | LockAction::Put => Feedback::DeniedInventory { owner },
        LockAction::Door => Feedback::DeniedDoor { owner },
        LockAction::EntityInteract => Feedback::DeniedEntity { owner },
        LockAction::BlockInteract => Feedback::DeniedBlockInteract,
    }
}

/// Resolves a single action against a single lock.
pub fn decide(lock: &Lock, action: LockAction, actor: UserId, state: ActorState) -> AccessDecision {
    // Public locks gate nothing.
    if lock.is_public() {
        return AccessDecision::allow();
    }
    if lock.is_owner(actor) {
        let mut decision = AccessDecision::allow();
        decision.notify_owner = false;
        return decision;
    }

    // A presented KeyBook short-circuits everything else: a valid one opens,
    // any other one denies. Broken books were already reduced to inert items
    // and count as not presented.
    if let Some(book) = state.key_book.filter(|book| !book.broken) {
        match book.check(lock) {
            KeyBookOutcome::Unlocks => {
                let mut decision = AccessDecision::allow();
                decision.key_book_used = true;
                return decision;
            }
            KeyBookOutcome::WrongLock => {
                return AccessDecision::deny(Feedback::KeyBookNothingHappens);
            }
            KeyBookOutcome::Stale => {
                let mut decision = AccessDecision::deny(Feedback::KeyBookBroken);
                decision.invalidate_key_book = true;
                return decision;
            }
            KeyBookOutcome::Broken => unreachable!("filtered above"),
        }
    }

    if state.unlocked || state.bypass {
        return AccessDecision::allow();
    }

    let granted = match (lock.lock_type(), action) {
        (LockType::Public, _) => true,
        (LockType::Private | LockType::Guarded, action) => match action {
            LockAction::Take => state.access.is_some_and(|a| a.can_out()),
            LockAction::Put => state.access.is_some_and(|a| a.can_in()),
            LockAction::Door => state.access.is_some_and(|a| a.can_in() && a.can_out()),
            LockAction::EntityInteract => state.access.is_some(),
            // The access list does not extend to plain block interaction.
            LockAction::BlockInteract => false,
        },
        (LockType::Donation, LockAction::Put) => true,
        (LockType::Donation, LockAction::Take) => state.access.is_some_and(|a| a.can_out()),
        (LockType::Free, LockAction::Take) => true,
        (LockType::Free, LockAction::Put) => state.access.is_some_and(|a| a.can_in()),
        // Donation/free locks only exist on containers; other actions fall
        // back to requiring an explicit grant.
        (LockType::Donation | LockType::Free, _) => state.access.is_some(),
    };

    if granted {
        AccessDecision::allow()
    } else {
        AccessDecision::deny(denial_feedback(action, lock, state.show_owner))
    }
}

/// Outcome of a password attempt against a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The lock has no password; nothing happens.
    NoPassword,
    /// Correct password; the caller records the session unlock.
    Success,
    /// Wrong password; the caller applies the punitive feedback.
    WrongPassword,
}

pub fn check_unlock(lock: &Lock, supplied: &str) -> UnlockOutcome {
    if !lock.has_password() {
        UnlockOutcome::NoPassword
    } else if lock.check_password(supplied) {
        UnlockOutcome::Success
    } else {
        UnlockOutcome::WrongPassword
    }
}
