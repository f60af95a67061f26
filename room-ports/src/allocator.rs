//! First-fit allocation of port ranges from the ephemeral pool.
//!
//! The allocator keeps no state of its own. Callers pass the ranges currently
//! claimed by live rooms (read from the runtime) on every call.

use crate::error::PortError;
use crate::range::PortRange;

/// Finds the lowest range of `width` ports inside `pool` that overlaps none of `claimed`.
///
/// Claimed ranges may be unsorted, overlap each other or lie partly outside the pool.
pub fn allocate(pool: PortRange, width: u16, claimed: &[PortRange]) -> Result<PortRange, PortError> {
    if width == 0 {
        return Err(PortError::ZeroWidth(width));
    }

    let exhausted = || PortError::PoolExhausted {
        pool: pool.to_string(),
        width,
    };

    let width = u32::from(width);
    let pool_end = u32::from(pool.end);
    let mut current = u32::from(pool.start);

    loop {
        let candidate_end = current + width - 1;
        if candidate_end > pool_end {
            return Err(exhausted());
        }

        // Jump past every claimed range that collides with the candidate window
        let blocked_until = claimed
            .iter()
            .filter(|r| u32::from(r.start) <= candidate_end && u32::from(r.end) >= current)
            .map(|r| u32::from(r.end))
            .max();

        match blocked_until {
            None => {
                // both bounds are within pool.start..=pool.end, so they fit in u16
                return PortRange::new(current as u16, candidate_end as u16);
            }
            Some(end) => current = end + 1,
        }
    }
}

/// Total number of pool ports not covered by any claimed range.
pub fn free_ports(pool: PortRange, claimed: &[PortRange]) -> u32 {
    pool.ports()
        .filter(|port| !claimed.iter().any(|r| r.start <= *port && *port <= r.end))
        .count() as u32
}
