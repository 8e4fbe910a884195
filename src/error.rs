use scriptbind_core::TypeHash;
use thiserror::Error;

/// Errors raised when a class definition is submitted to the registry.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The type is already registered
    #[error("class '{name}' is already registered ({type_hash})")]
    DuplicateClass { name: String, type_hash: TypeHash },

    /// The script name is taken by a different type
    #[error("name '{name}' is already used by another class")]
    DuplicateName { name: String },

    /// The super type has not been registered
    #[error("class '{name}' extends unregistered type {super_type}")]
    UnknownSuperType { name: String, super_type: TypeHash },

    /// Neither a script name nor an engine name was given
    #[error("class with type {type_hash} has no name")]
    EmptyName { type_hash: TypeHash },
}

pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
