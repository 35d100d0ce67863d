// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric identifiers whose value is visible outside the table (output path
//! ids announced to peers). A released id is handed out again before the
//! counter advances, and no two live holders ever share an id.

use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
    released: Vec<u32>,
    live: BTreeSet<u32>,
}

impl IdAllocator {
    /// An allocator whose first fresh id is `first`.
    pub fn new(first: u32) -> Self {
        Self {
            next: first,
            released: Vec::new(),
            live: BTreeSet::new(),
        }
    }

    pub fn alloc(&mut self) -> u32 {
        let id = match self.released.pop() {
            Some(id) => id,
            None => {
                let id = self.next;
                self.next = self.next.wrapping_add(1);
                id
            }
        };
        self.live.insert(id);
        id
    }

    /// Return `id` for reuse. Releasing an id that is not live is ignored,
    /// so a double release can never hand one id to two holders.
    pub fn release(&mut self, id: u32) -> bool {
        if self.live.remove(&id) {
            self.released.push(id);
            true
        } else {
            false
        }
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}
