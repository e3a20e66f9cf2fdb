//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod connection;
pub mod ledger_entry;
pub mod membership;
pub mod user;

// Re-export specific types to avoid conflicts
pub use connection::{
    Column as ConnectionColumn, ConnectionStatus, Entity as Connection, Initiator,
    Model as ConnectionModel,
};
pub use ledger_entry::{
    Column as LedgerEntryColumn, Entity as LedgerEntry, EntryType, Model as LedgerEntryModel,
};
pub use membership::{
    Column as MembershipColumn, Entity as Membership, Model as MembershipModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
