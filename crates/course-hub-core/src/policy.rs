//! Access policy engine.
//!
//! Roles are derived, not stored: a caller may be a moderator (group
//! membership) and, per object, the owner. Roles are resolved once per
//! request into a [`Principal`]; every rule below is a pure function of that
//! principal and, for object-level actions, the object's owner.

use std::fmt;

use crate::course::{Course, Lesson};
use crate::user::User;
use crate::UserId;

/// Roles held by the caller independent of any particular object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet {
    /// Member of the moderator group.
    pub moderator: bool,
}

/// The authenticated caller with resolved roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// Caller identity.
    pub user_id: UserId,
    /// Resolved roles.
    pub roles: RoleSet,
}

impl Principal {
    /// Resolve roles for a loaded user.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            roles: RoleSet {
                moderator: user.is_moderator(),
            },
        }
    }
}

/// Anything with an owner.
pub trait Owned {
    /// The owner, if any.
    fn owner(&self) -> Option<UserId>;
}

impl Owned for Course {
    fn owner(&self) -> Option<UserId> {
        self.owner
    }
}

impl Owned for Lesson {
    fn owner(&self) -> Option<UserId> {
        self.owner
    }
}

/// Actions subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// List or retrieve courses.
    ViewCourse,
    /// Create a course.
    CreateCourse,
    /// Full or partial update of a course.
    UpdateCourse,
    /// Delete a course.
    DeleteCourse,
    /// List or retrieve lessons.
    ViewLesson,
    /// Create a lesson.
    CreateLesson,
    /// Full or partial update of a lesson.
    UpdateLesson,
    /// Delete a lesson.
    DeleteLesson,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ViewCourse => "view course",
            Self::CreateCourse => "create course",
            Self::UpdateCourse => "update course",
            Self::DeleteCourse => "delete course",
            Self::ViewLesson => "view lesson",
            Self::CreateLesson => "create lesson",
            Self::UpdateLesson => "update lesson",
            Self::DeleteLesson => "delete lesson",
        };
        f.write_str(name)
    }
}

/// Result of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused.
    Deny(Denial),
}

impl Decision {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into a `Result` for `?` propagation.
    ///
    /// # Errors
    ///
    /// Returns the `Denial` when the action is refused.
    pub const fn into_result(self) -> Result<(), Denial> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(denial) => Err(denial),
        }
    }

    const fn from_bool(allowed: bool, action: Action) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny(Denial { action })
        }
    }
}

/// An authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not allowed to {action}")]
pub struct Denial {
    /// The refused action.
    pub action: Action,
}

/// Caller belongs to the moderator group.
#[must_use]
pub const fn is_moderator(principal: &Principal) -> bool {
    principal.roles.moderator
}

/// Caller created the object.
#[must_use]
pub fn is_owner<T: Owned + ?Sized>(principal: &Principal, object: &T) -> bool {
    object.owner() == Some(principal.user_id)
}

/// Caller is not a moderator.
#[must_use]
pub const fn not_moderator(principal: &Principal) -> bool {
    !is_moderator(principal)
}

/// Caller is a moderator or created the object.
#[must_use]
pub fn moderator_or_owner<T: Owned + ?Sized>(principal: &Principal, object: &T) -> bool {
    is_moderator(principal) || is_owner(principal, object)
}

/// Decide an action that has no target object.
///
/// Object-level actions are refused here; use [`authorize_object`].
#[must_use]
pub const fn authorize(principal: &Principal, action: Action) -> Decision {
    let allowed = match action {
        Action::ViewCourse | Action::ViewLesson | Action::CreateLesson => true,
        Action::CreateCourse => not_moderator(principal),
        Action::UpdateCourse | Action::DeleteCourse | Action::UpdateLesson | Action::DeleteLesson => {
            false
        }
    };
    Decision::from_bool(allowed, action)
}

/// Decide an action against a specific object.
#[must_use]
pub fn authorize_object<T: Owned + ?Sized>(
    principal: &Principal,
    action: Action,
    object: &T,
) -> Decision {
    let allowed = match action {
        Action::ViewCourse | Action::ViewLesson | Action::CreateLesson => true,
        Action::CreateCourse | Action::DeleteCourse => not_moderator(principal),
        Action::UpdateCourse | Action::UpdateLesson => moderator_or_owner(principal, object),
        Action::DeleteLesson => is_owner(principal, object),
    };
    Decision::from_bool(allowed, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn principal(moderator: bool) -> Principal {
        Principal {
            user_id: UserId::generate(),
            roles: RoleSet { moderator },
        }
    }

    fn course_owned_by(owner: UserId) -> Course {
        Course::new(owner, "Rust", String::new(), Utc::now()).unwrap()
    }

    fn lesson_owned_by(owner: UserId) -> Lesson {
        Lesson::new(
            owner,
            crate::CourseId::generate(),
            "Ownership",
            String::new(),
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn owner_who_is_not_moderator_can_update_course() {
        let owner = principal(false);
        let course = course_owned_by(owner.user_id);
        assert!(authorize_object(&owner, Action::UpdateCourse, &course).is_allowed());
    }

    #[test]
    fn moderator_can_update_foreign_course_but_not_create_or_delete() {
        let moderator = principal(true);
        let course = course_owned_by(UserId::generate());
        assert!(authorize_object(&moderator, Action::UpdateCourse, &course).is_allowed());
        assert!(!authorize_object(&moderator, Action::DeleteCourse, &course).is_allowed());
        assert!(!authorize(&moderator, Action::CreateCourse).is_allowed());
    }

    #[test]
    fn stranger_cannot_update_course() {
        let stranger = principal(false);
        let course = course_owned_by(UserId::generate());
        let decision = authorize_object(&stranger, Action::UpdateCourse, &course);
        assert_eq!(
            decision,
            Decision::Deny(Denial {
                action: Action::UpdateCourse
            })
        );
    }

    #[test]
    fn moderator_can_update_lesson_but_not_delete_it() {
        let moderator = principal(true);
        let lesson = lesson_owned_by(UserId::generate());
        assert!(authorize_object(&moderator, Action::UpdateLesson, &lesson).is_allowed());
        assert!(!authorize_object(&moderator, Action::DeleteLesson, &lesson).is_allowed());
    }

    #[test]
    fn lesson_owner_can_update_and_delete() {
        let owner = principal(false);
        let lesson = lesson_owned_by(owner.user_id);
        assert!(authorize_object(&owner, Action::UpdateLesson, &lesson).is_allowed());
        assert!(authorize_object(&owner, Action::DeleteLesson, &lesson).is_allowed());
    }

    #[test]
    fn stranger_cannot_touch_foreign_lesson() {
        let stranger = principal(false);
        let lesson = lesson_owned_by(UserId::generate());
        assert!(!authorize_object(&stranger, Action::UpdateLesson, &lesson).is_allowed());
        assert!(!authorize_object(&stranger, Action::DeleteLesson, &lesson).is_allowed());
    }

    #[test]
    fn ownerless_objects_have_no_owner() {
        let caller = principal(false);
        let mut course = course_owned_by(caller.user_id);
        course.owner = None;
        assert!(!is_owner(&caller, &course));
    }

    #[test]
    fn everyone_authenticated_can_view() {
        for p in [principal(true), principal(false)] {
            assert!(authorize(&p, Action::ViewCourse).is_allowed());
            assert!(authorize(&p, Action::ViewLesson).is_allowed());
        }
    }

    #[test]
    fn denial_message_names_action() {
        let denial = Denial {
            action: Action::DeleteLesson,
        };
        assert_eq!(denial.to_string(), "not allowed to delete lesson");
    }
}
