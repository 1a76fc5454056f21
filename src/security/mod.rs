//! Authorization for guild-scoped writes.

mod policy;

pub use policy::{
    Operation, PermissionCheck, can_invite_bot, can_manage_guild, check_operation,
};
