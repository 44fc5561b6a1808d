//! Eligibility callbacks invoked by the name registry module.

use crate::errors::Result;
use tally_types::Address;

/// Implemented by every module that reacts to name ownership changes.
pub trait NameHooks {
    /// `address` now holds its first name.
    fn on_first_eligibility_gained(&mut self, address: &Address) -> Result<()>;

    /// `address` gave up its last name.
    fn on_last_eligibility_lost(&mut self, address: &Address) -> Result<()>;
}

/// Runs registered hooks in registration order and stops at the first
/// error; later hooks do not run.
#[derive(Default)]
pub struct NameHookChain<'a> {
    hooks: Vec<&'a mut dyn NameHooks>,
}

impl<'a> NameHookChain<'a> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(mut self, hook: &'a mut dyn NameHooks) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl NameHooks for NameHookChain<'_> {
    fn on_first_eligibility_gained(&mut self, address: &Address) -> Result<()> {
        for hook in self.hooks.iter_mut() {
            hook.on_first_eligibility_gained(address)?;
        }
        Ok(())
    }

    fn on_last_eligibility_lost(&mut self, address: &Address) -> Result<()> {
        for hook in self.hooks.iter_mut() {
            hook.on_last_eligibility_lost(address)?;
        }
        Ok(())
    }
}
