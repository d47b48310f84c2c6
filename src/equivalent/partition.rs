use std::collections::BTreeSet;

use tracing::debug;

use crate::error::EquivalentError;
use crate::network::Network;

/// Split of the network buses into the retained internal area, the boundary and the
/// external area to be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusPartition {
    pub internal: BTreeSet<i64>,
    /// One boundary bus per switch-fused group, in caller order.
    pub boundary: Vec<i64>,
    /// All listed boundary buses plus every non-internal bus fused to one of them by a closed
    /// bus-bus switch.
    pub boundary_inclusive: BTreeSet<i64>,
    /// Every bus that is neither internal nor in `boundary_inclusive`.
    pub external: BTreeSet<i64>,
}

impl BusPartition {
    pub fn new(net: &Network, boundary: &[i64], internal: &[i64]) -> Result<Self, EquivalentError> {
        if boundary.is_empty() {
            return Err(EquivalentError::InvalidPartition(
                "at least one boundary bus is required".to_owned(),
            ));
        }
        let mut seen = BTreeSet::new();
        for &bus in boundary.iter().chain(internal) {
            if !net.bus.contains_key(&bus) {
                return Err(EquivalentError::InvalidPartition(format!("bus {bus} does not exist")));
            }
            if !seen.insert(bus) {
                return Err(EquivalentError::InvalidPartition(format!(
                    "bus {bus} is listed more than once"
                )));
            }
        }
        let internal: BTreeSet<i64> = internal.iter().copied().collect();

        let mut representatives = Vec::with_capacity(boundary.len());
        let mut boundary_inclusive = BTreeSet::new();
        for &bus in boundary {
            if boundary_inclusive.contains(&bus) {
                debug!(bus, "boundary bus fused to an earlier one");
                continue;
            }
            representatives.push(bus);
            boundary_inclusive.extend(net.fused_buses(bus, &internal));
        }
        let external = net
            .bus
            .keys()
            .filter(|b| !internal.contains(b) && !boundary_inclusive.contains(b))
            .copied()
            .collect();
        Ok(Self {
            internal,
            boundary: representatives,
            boundary_inclusive,
            external,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::*;
    use crate::testcases::{five_bus, seven_bus};

    #[test]
    fn external_is_the_complement() {
        let p = BusPartition::new(&seven_bus(), &[1, 0], &[5, 6]).unwrap();
        assert_eq!(p.boundary, vec![1, 0]);
        assert_eq!(p.external, BTreeSet::from([2, 3, 4]));
        assert_eq!(p.boundary_inclusive, BTreeSet::from([0, 1]));
    }

    #[test]
    fn switch_fused_buses_join_the_boundary() {
        let mut net = five_bus();
        let b5 = net.create_bus(Bus::new(110.0));
        let b6 = net.create_bus(Bus::new(110.0));
        net.create_switch(Switch::bus_bus(1, b5)).unwrap();
        net.create_switch(Switch::bus_bus(b5, 0)).unwrap();
        let mut open = Switch::bus_bus(1, b6);
        open.closed = false;
        net.create_switch(open).unwrap();

        let p = BusPartition::new(&net, &[1, 0], &[]).unwrap();
        // Bus 0 is fused to bus 1 through bus 5 and is represented by it.
        assert_eq!(p.boundary, vec![1]);
        assert_eq!(p.boundary_inclusive, BTreeSet::from([0, 1, b5]));
        assert_eq!(p.external, BTreeSet::from([2, 3, 4, b6]));
    }

    #[test]
    fn fusing_does_not_cross_the_internal_area() {
        let mut net = seven_bus();
        let b7 = net.create_bus(Bus::new(110.0));
        net.create_switch(Switch::bus_bus(1, 6)).unwrap();
        net.create_switch(Switch::bus_bus(6, b7)).unwrap();
        let p = BusPartition::new(&net, &[0, 1], &[5, 6]).unwrap();
        assert_eq!(p.boundary_inclusive, BTreeSet::from([0, 1]));
        assert!(p.external.contains(&b7));
    }

    #[test]
    fn overlapping_or_unknown_buses_are_rejected() {
        let net = seven_bus();
        let cases = [
            (vec![], vec![5]),
            (vec![0, 1], vec![1]),
            (vec![0, 0], vec![]),
            (vec![0], vec![42]),
        ];
        for (b, i) in cases {
            assert!(matches!(
                BusPartition::new(&net, &b, &i),
                Err(EquivalentError::InvalidPartition(_))
            ));
        }
    }
}
