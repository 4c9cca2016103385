// Gateway module for crypto - follows the Train Station Pattern
// All external access must go through this gateway

mod cipher;
mod identity;

pub use cipher::{MachineCipher, SecretCipher};
pub use identity::{MachineIdentity, OsMachineIdentity};

#[cfg(test)]
pub(crate) use identity::MockMachineIdentity;
