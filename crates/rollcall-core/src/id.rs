//! Identifier aliases used across the Rollcall crates.
//!
//! Identifiers are opaque strings supplied by the surrounding platform
//! (event catalog, identity provider); locally created records get uuid v4
//! ids via [`generate_id`].

pub type EventId = String;
pub type VolunteerId = String;
pub type RegistrationId = String;
pub type SlotId = String;
pub type CategoryId = String;
pub type UserId = String;

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
