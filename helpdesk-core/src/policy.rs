//! Role-based access rules
//!
//! Handlers resolve the caller into an [`Actor`] and ask these functions
//! before touching a row. List endpoints use [`TicketScope`] to push the
//! same visibility rule into SQL.

use uuid::Uuid;

use crate::models::Role;

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Ownership facts about a ticket needed for access checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketOwnership {
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
}

impl TicketOwnership {
    fn is_creator(&self, actor: &Actor) -> bool {
        self.created_by == actor.id
    }

    fn is_assignee(&self, actor: &Actor) -> bool {
        self.assigned_to == Some(actor.id)
    }
}

/// Which tickets a list query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    CreatedOrAssigned(Uuid),
    CreatedBy(Uuid),
}

impl TicketScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Admin => TicketScope::All,
            Role::Agent => TicketScope::CreatedOrAssigned(actor.id),
            Role::User => TicketScope::CreatedBy(actor.id),
        }
    }

    /// In-memory twin of the SQL filter.
    pub fn includes(&self, ticket: &TicketOwnership) -> bool {
        match *self {
            TicketScope::All => true,
            TicketScope::CreatedOrAssigned(id) => {
                ticket.created_by == id || ticket.assigned_to == Some(id)
            }
            TicketScope::CreatedBy(id) => ticket.created_by == id,
        }
    }
}

/// Admins see everything, agents what they filed or were given, users what they filed.
pub fn can_view_ticket(actor: &Actor, ticket: &TicketOwnership) -> bool {
    TicketScope::for_actor(actor).includes(ticket)
}

/// Title, description and priority edits.
pub fn can_edit_ticket(actor: &Actor, ticket: &TicketOwnership) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Agent => ticket.is_assignee(actor) || ticket.is_creator(actor),
        Role::User => ticket.is_creator(actor),
    }
}

/// Only agents and admins move tickets through the lifecycle.
pub fn can_change_status(actor: &Actor, ticket: &TicketOwnership) -> bool {
    actor.role.is_staff() && can_view_ticket(actor, ticket)
}

pub fn can_assign(actor: &Actor, ticket: &TicketOwnership) -> bool {
    actor.role.is_staff() && can_view_ticket(actor, ticket)
}

/// Only agents and admins can receive assignments.
pub fn can_be_assigned(role: Role) -> bool {
    role.is_staff()
}

pub fn can_delete_ticket(actor: &Actor) -> bool {
    actor.role.is_admin()
}

pub fn can_comment(actor: &Actor, ticket: &TicketOwnership) -> bool {
    can_view_ticket(actor, ticket)
}

pub fn can_edit_comment(actor: &Actor, comment_author: Uuid) -> bool {
    actor.role.is_admin() || actor.id == comment_author
}

pub fn can_view_reports(actor: &Actor) -> bool {
    actor.role.is_admin()
}

/// Staff can look anyone up (to pick assignees); users only themselves.
pub fn can_view_user(actor: &Actor, user_id: Uuid) -> bool {
    actor.role.is_staff() || actor.id == user_id
}

/// Profile fields (names, email, phone, department).
pub fn can_edit_profile(actor: &Actor, user_id: Uuid) -> bool {
    actor.role.is_admin() || actor.id == user_id
}

/// Role changes and deletions.
pub fn can_manage_users(actor: &Actor) -> bool {
    actor.role.is_admin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role)
    }

    fn ticket_by(creator: &Actor) -> TicketOwnership {
        TicketOwnership {
            created_by: creator.id,
            assigned_to: None,
        }
    }

    #[test]
    fn creator_and_admin_see_ticket_other_users_do_not() {
        let owner = actor(Role::User);
        let other = actor(Role::User);
        let admin = actor(Role::Admin);
        let ticket = ticket_by(&owner);

        assert!(can_view_ticket(&owner, &ticket));
        assert!(can_view_ticket(&admin, &ticket));
        assert!(!can_view_ticket(&other, &ticket));
    }

    #[test]
    fn assigned_agent_sees_ticket() {
        let owner = actor(Role::User);
        let agent = actor(Role::Agent);
        let bystander = actor(Role::Agent);
        let ticket = TicketOwnership {
            created_by: owner.id,
            assigned_to: Some(agent.id),
        };

        assert!(can_view_ticket(&agent, &ticket));
        assert!(!can_view_ticket(&bystander, &ticket));
    }

    #[test]
    fn users_cannot_change_status_even_on_own_ticket() {
        let owner = actor(Role::User);
        let ticket = ticket_by(&owner);
        assert!(can_edit_ticket(&owner, &ticket));
        assert!(!can_change_status(&owner, &ticket));
    }

    #[test]
    fn assigned_agent_changes_status() {
        let owner = actor(Role::User);
        let agent = actor(Role::Agent);
        let ticket = TicketOwnership {
            created_by: owner.id,
            assigned_to: Some(agent.id),
        };
        assert!(can_change_status(&agent, &ticket));
        assert!(!can_change_status(&actor(Role::Agent), &ticket));
        assert!(can_change_status(&actor(Role::Admin), &ticket));
    }

    #[test]
    fn delete_and_reports_are_admin_only() {
        for role in [Role::User, Role::Agent] {
            assert!(!can_delete_ticket(&actor(role)));
            assert!(!can_view_reports(&actor(role)));
        }
        assert!(can_delete_ticket(&actor(Role::Admin)));
        assert!(can_view_reports(&actor(Role::Admin)));
    }

    #[test]
    fn comment_edits_by_author_or_admin() {
        let author = actor(Role::User);
        assert!(can_edit_comment(&author, author.id));
        assert!(!can_edit_comment(&actor(Role::Agent), author.id));
        assert!(can_edit_comment(&actor(Role::Admin), author.id));
    }

    #[test]
    fn scope_matches_role() {
        let admin = actor(Role::Admin);
        let agent = actor(Role::Agent);
        let user = actor(Role::User);
        assert_eq!(TicketScope::for_actor(&admin), TicketScope::All);
        assert_eq!(
            TicketScope::for_actor(&agent),
            TicketScope::CreatedOrAssigned(agent.id)
        );
        assert_eq!(TicketScope::for_actor(&user), TicketScope::CreatedBy(user.id));
    }

    #[test]
    fn user_lookup_rules() {
        let user = actor(Role::User);
        let someone = Uuid::new_v4();
        assert!(can_view_user(&user, user.id));
        assert!(!can_view_user(&user, someone));
        assert!(can_view_user(&actor(Role::Agent), someone));
        assert!(!can_edit_profile(&actor(Role::Agent), someone));
        assert!(can_edit_profile(&user, user.id));
        assert!(!can_manage_users(&actor(Role::Agent)));
    }

    #[test]
    fn only_staff_take_assignments() {
        assert!(!can_be_assigned(Role::User));
        assert!(can_be_assigned(Role::Agent));
        assert!(can_be_assigned(Role::Admin));
    }
}
