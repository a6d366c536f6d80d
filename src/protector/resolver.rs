//! Region-axis resolution: the tri-state fold.
//!
//! [`check_setting`] is the single precedence rule for every region-gated
//! action. The ordered region list comes from the manager; the fold stops
//! at the first definite opinion. A definite `False` cancels the event, a
//! definite `True` un-cancels it (explosion block damage and similar
//! events arrive pre-cancelled and must be revivable), and `Undefined`
//! falls back to the caller's default so dependent checks can chain.

use std::sync::Arc;

use crate::events::Cancellable;
use crate::host::{PermissionProvider, UserId};
use crate::host::perms;
use crate::protector::region::Region;
use crate::protector::settings::{MoveCheck, Settings};
use crate::protector::tristate::Tristate;

/// Folds one setting over the ordered applicable regions.
pub fn check_setting<E: Cancellable>(
    event: &mut E,
    actor: Option<UserId>,
    regions: &[Arc<Region>],
    bypass_perm: Option<&str>,
    selector: impl Fn(&Settings) -> Tristate,
    default_to: Tristate,
    perms: &dyn PermissionProvider,
) -> Tristate {
    if let (Some(actor), Some(node)) = (actor, bypass_perm) {
        if perms.has_permission(actor, node) {
            event.set_cancelled(false);
            return Tristate::True;
        }
    }

    let mut allow = Tristate::Undefined;
    for region in regions {
        allow = allow.and(selector(region.settings()));
        if allow.is_defined() {
            if allow == Tristate::False {
                event.set_cancelled(true);
                return Tristate::False;
            }
            break;
        }
    }
    if allow == Tristate::True {
        event.set_cancelled(false);
    }
    if allow == Tristate::Undefined {
        return default_to;
    }
    allow
}

/// The bypass node matching a movement check.
pub fn move_bypass_node(check: MoveCheck) -> &'static str {
    match check {
        MoveCheck::Move => perms::BYPASS_MOVE_MOVE,
        MoveCheck::Enter => perms::BYPASS_MOVE_ENTER,
        MoveCheck::Exit => perms::BYPASS_MOVE_EXIT,
        MoveCheck::Teleport => perms::BYPASS_MOVE_TELEPORT,
        MoveCheck::TeleportPortal => perms::BYPASS_MOVE_TELEPORT_PORTAL,
    }
}

/// Movement variant of the fold. Returns true when the move was denied
/// (and the event cancelled).
///
/// With `contain` set (EXIT and ENTER checks), a denying region is
/// overridden when it also appears in the other side's region set - moving
/// within nested or overlapping parts of the same region is not an exit or
/// an entry - and the fold keeps scanning instead of stopping at the first
/// definite opinion.
pub fn check_move<E: Cancellable>(
    event: &mut E,
    actor: UserId,
    source: &[Arc<Region>],
    dest: &[Arc<Region>],
    check: MoveCheck,
    contain: bool,
    perms: &dyn PermissionProvider,
) -> bool {
    if perms.has_permission(actor, move_bypass_node(check)) {
        return false;
    }

    let mut allow = Tristate::Undefined;
    for region in source {
        allow = allow.and(region.settings().r#move.for_check(check));
        if allow.is_defined() {
            if allow == Tristate::False
                && (!contain || !dest.iter().any(|other| Arc::ptr_eq(other, region)))
            {
                event.set_cancelled(true);
                return true;
            }
            if !contain {
                break;
            }
        }
    }
    false
}
