//! Contact relationship registry.
//!
//! The authoritative in-memory index of the current user's contacts within a
//! session. The alert machine and ping coordinator read and write through it
//! rather than holding their own copies. Persistence is the caller's job;
//! the registry never touches the durable store.

use tracing::debug;

use crate::contact::{Contact, Role, RoleSet};
use crate::error::{ConflictError, EngineError, ValidationError};

/// Insertion-ordered contact index.
///
/// Order carries no meaning, but it is stable so role views are
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct ContactRegistry {
    contacts: Vec<Contact>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a cached snapshot.
    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Insert or replace a contact by relationship id.
    ///
    /// Replacing keeps the contact's position. Fails with a conflict when the
    /// id already exists bound to a different counterpart identity, and with
    /// a validation error when the role set is empty.
    pub fn upsert(&mut self, contact: Contact) -> Result<(), EngineError> {
        if contact.roles.is_empty() {
            return Err(ValidationError::EmptyRoleSet.into());
        }

        match self.position(&contact.id) {
            Some(idx) => {
                if self.contacts[idx].counterpart_id != contact.counterpart_id {
                    return Err(ConflictError::DuplicateContact {
                        contact_id: contact.id,
                    }
                    .into());
                }
                self.contacts[idx] = contact;
            }
            None => {
                debug!(contact = %contact.id, "contact registered");
                self.contacts.push(contact);
            }
        }
        Ok(())
    }

    /// Remove a contact. Idempotent: removing an unknown id is a no-op.
    /// Returns the removed contact, if any.
    pub fn remove(&mut self, contact_id: &str) -> Option<Contact> {
        let idx = self.position(contact_id)?;
        Some(self.contacts.remove(idx))
    }

    /// Replace a contact's role set.
    pub fn set_roles(&mut self, contact_id: &str, roles: RoleSet) -> Result<&Contact, EngineError> {
        if roles.is_empty() {
            return Err(ValidationError::EmptyRoleSet.into());
        }
        let contact = self.find_mut(contact_id)?;
        contact.roles = roles;
        Ok(contact)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn find(&self, contact_id: &str) -> Result<&Contact, EngineError> {
        self.contacts
            .iter()
            .find(|c| c.id == contact_id)
            .ok_or_else(|| EngineError::NotFound {
                id: contact_id.to_string(),
            })
    }

    pub(crate) fn find_mut(&mut self, contact_id: &str) -> Result<&mut Contact, EngineError> {
        self.contacts
            .iter_mut()
            .find(|c| c.id == contact_id)
            .ok_or_else(|| EngineError::NotFound {
                id: contact_id.to_string(),
            })
    }

    /// Contacts holding the responder role, in insertion order.
    pub fn responders(&self) -> Vec<&Contact> {
        self.with_role(Role::Responder)
    }

    /// Contacts holding the dependent role, in insertion order.
    pub fn dependents(&self) -> Vec<&Contact> {
        self.with_role(Role::Dependent)
    }

    fn with_role(&self, role: Role) -> Vec<&Contact> {
        self.contacts
            .iter()
            .filter(|c| c.roles.contains(role))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.contacts.iter_mut()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    fn position(&self, contact_id: &str) -> Option<usize> {
        self.contacts.iter().position(|c| c.id == contact_id)
    }
}
