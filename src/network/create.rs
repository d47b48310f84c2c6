//! Element creation and deletion primitives.
//!
//! New elements get the next free index of their table. Creation validates bus references;
//! deletion never fails and silently skips indices that do not exist.

use std::collections::BTreeSet;

use tracing::debug;

use super::{elements::*, Network, Table};
use crate::error::NetworkError;

fn next_index<T>(table: &Table<T>) -> i64 {
    table.keys().next_back().map_or(0, |&idx| idx + 1)
}

fn insert<T>(table: &mut Table<T>, element: T) -> i64 {
    let idx = next_index(table);
    table.insert(idx, element);
    idx
}

fn check_bus(buses: &Table<Bus>, element: &'static str, bus: i64) -> Result<(), NetworkError> {
    if buses.contains_key(&bus) {
        Ok(())
    } else {
        Err(NetworkError::UnknownBus { element, bus })
    }
}

macro_rules! create_bus_element {
    ($($(#[$doc:meta])* $fn_name:ident => $field:ident: $ty:ty),* $(,)?) => {
        impl Network {
            $(
                $(#[$doc])*
                pub fn $fn_name(&mut self, element: $ty) -> Result<i64, NetworkError> {
                    check_bus(&self.bus, <$ty as BusElement>::KIND, element.bus())?;
                    Ok(insert(&mut self.$field, element))
                }
            )*
        }
    };
}

macro_rules! create_branch_element {
    ($($fn_name:ident => $field:ident: $ty:ty),* $(,)?) => {
        impl Network {
            $(
                pub fn $fn_name(&mut self, element: $ty) -> Result<i64, NetworkError> {
                    let kind = <$ty as BranchElement>::KIND;
                    check_bus(&self.bus, kind, element.from_bus())?;
                    check_bus(&self.bus, kind, element.to_bus())?;
                    Ok(insert(&mut self.$field, element))
                }
            )*
        }
    };
}

create_bus_element!(
    create_load => load: Load,
    create_sgen => sgen: SGen,
    create_gen => generator: Gen,
    create_storage => storage: Storage,
    /// Adds an external grid. Several references on one bus are allowed here; the equivalent
    /// pipeline rejects them.
    create_ext_grid => ext_grid: ExtGrid,
    create_shunt => shunt: Shunt,
    create_ward => ward: Ward,
    create_xward => xward: XWard,
);

create_branch_element!(
    create_line => line: Line,
    create_transformer => trafo: Transformer,
    create_impedance => impedance: Impedance,
);

impl Network {
    /// Adds a bus and returns its index.
    pub fn create_bus(&mut self, bus: Bus) -> i64 {
        insert(&mut self.bus, bus)
    }

    /// Adds a shunt drawing `p_mw + j q_mvar` at the rated voltage of `bus`.
    pub fn create_shunt_at_bus(
        &mut self,
        bus: i64,
        p_mw: f64,
        q_mvar: f64,
        name: Option<&str>,
    ) -> Result<i64, NetworkError> {
        let vn_kv = self
            .bus
            .get(&bus)
            .map(|b| b.vn_kv)
            .ok_or(NetworkError::UnknownBus { element: "shunt", bus })?;
        self.create_shunt(Shunt {
            name: name.map(str::to_owned),
            bus,
            p_mw,
            q_mvar,
            vn_kv,
            step: 1,
            in_service: true,
        })
    }

    /// Adds a switch. Bus-bus switches must reference an existing second bus, line and
    /// transformer switches an existing branch.
    pub fn create_switch(&mut self, switch: Switch) -> Result<i64, NetworkError> {
        check_bus(&self.bus, "switch", switch.bus)?;
        match switch.et {
            SwitchType::SwitchTwoBuses => check_bus(&self.bus, "switch", switch.element)?,
            SwitchType::SwitchBusLine if !self.line.contains_key(&switch.element) => {
                return Err(NetworkError::UnknownElement {
                    element: "line",
                    index: switch.element,
                });
            }
            SwitchType::SwitchBusTransformer if !self.trafo.contains_key(&switch.element) => {
                return Err(NetworkError::UnknownElement {
                    element: "trafo",
                    index: switch.element,
                });
            }
            _ => {}
        }
        Ok(insert(&mut self.switch, switch))
    }

    /// Removes buses together with every element attached to them.
    pub fn drop_buses(&mut self, buses: &BTreeSet<i64>) {
        if buses.is_empty() {
            return;
        }
        self.bus.retain(|idx, _| !buses.contains(idx));
        self.drop_elements_at(buses);
        self.ext_grid.retain(|_, e| !buses.contains(&e.bus));
        self.shunt.retain(|_, e| !buses.contains(&e.bus));
        self.ward.retain(|_, e| !buses.contains(&e.bus));
        self.xward.retain(|_, e| !buses.contains(&e.bus));
        self.line
            .retain(|_, l| !buses.contains(&l.from_bus) && !buses.contains(&l.to_bus));
        self.trafo
            .retain(|_, t| !buses.contains(&t.hv_bus) && !buses.contains(&t.lv_bus));
        self.impedance
            .retain(|_, i| !buses.contains(&i.from_bus) && !buses.contains(&i.to_bus));
        self.switch.retain(|_, s| {
            !buses.contains(&s.bus) && s.other_bus().is_none_or(|b| !buses.contains(&b))
        });
        self.drop_dangling_switches();
        debug!(count = buses.len(), "dropped buses");
    }

    /// Removes lines, transformers, impedances and bus-bus switches with both ends in `buses`.
    /// Closed zero-impedance bus-bus switches stay, so fused buses remain one node.
    pub fn drop_internal_branch_elements(&mut self, buses: &BTreeSet<i64>) {
        let inside = |a: i64, b: i64| buses.contains(&a) && buses.contains(&b);
        self.line.retain(|_, l| !inside(l.from_bus, l.to_bus));
        self.trafo.retain(|_, t| !inside(t.hv_bus, t.lv_bus));
        self.impedance.retain(|_, i| !inside(i.from_bus, i.to_bus));
        self.switch
            .retain(|_, s| s.fuses() || s.other_bus().is_none_or(|other| !inside(s.bus, other)));
        self.drop_dangling_switches();
    }

    /// Removes loads, static generators, generators and storage units at `buses`.
    pub fn drop_elements_at(&mut self, buses: &BTreeSet<i64>) {
        self.load.retain(|_, e| !buses.contains(&e.bus));
        self.sgen.retain(|_, e| !buses.contains(&e.bus));
        self.generator.retain(|_, e| !buses.contains(&e.bus));
        self.storage.retain(|_, e| !buses.contains(&e.bus));
    }

    /// Removes shunts at `buses`.
    pub fn drop_shunts_at(&mut self, buses: &BTreeSet<i64>) {
        self.shunt.retain(|_, e| !buses.contains(&e.bus));
    }

    /// Removes wards and extended wards at `buses`.
    pub fn drop_wards_at(&mut self, buses: &BTreeSet<i64>) {
        self.ward.retain(|_, e| !buses.contains(&e.bus));
        self.xward.retain(|_, e| !buses.contains(&e.bus));
    }

    fn drop_dangling_switches(&mut self) {
        let (line, trafo) = (&self.line, &self.trafo);
        self.switch.retain(|_, s| match s.et {
            SwitchType::SwitchBusLine => line.contains_key(&s.element),
            SwitchType::SwitchBusTransformer => trafo.contains_key(&s.element),
            SwitchType::SwitchTwoBuses => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> Network {
        let mut net = Network::new(50.0, 100.0);
        let a = net.create_bus(Bus::new(110.0));
        let b = net.create_bus(Bus::new(110.0));
        net.create_line(Line::new(a, b, 10.0, 0.1, 0.4)).unwrap();
        net.create_load(Load::new(b, 10.0, 2.0)).unwrap();
        net
    }

    #[test]
    fn indices_continue_after_the_largest_key() {
        let mut net = two_bus();
        net.bus.remove(&0);
        assert_eq!(net.create_bus(Bus::new(20.0)), 2);
        net.bus.clear();
        assert_eq!(net.create_bus(Bus::new(20.0)), 0);
    }

    #[test]
    fn unknown_bus_is_rejected() {
        let mut net = two_bus();
        let err = net.create_load(Load::new(7, 1.0, 0.0)).unwrap_err();
        assert_eq!(err, NetworkError::UnknownBus { element: "load", bus: 7 });
        let err = net.create_switch(Switch::bus_bus(0, 9)).unwrap_err();
        assert_eq!(err, NetworkError::UnknownBus { element: "switch", bus: 9 });
    }

    #[test]
    fn drop_buses_removes_attached_elements() {
        let mut net = two_bus();
        let sw = Switch {
            name: None,
            bus: 0,
            element: 0,
            et: SwitchType::SwitchBusLine,
            closed: true,
            z_ohm: 0.0,
        };
        net.create_switch(sw).unwrap();
        net.drop_buses(&BTreeSet::from([1]));
        assert_eq!(net.bus.len(), 1);
        assert!(net.line.is_empty());
        assert!(net.load.is_empty());
        assert!(net.switch.is_empty());
    }

    #[test]
    fn internal_branches_need_both_ends_inside() {
        let mut net = two_bus();
        let c = net.create_bus(Bus::new(110.0));
        net.create_line(Line::new(1, c, 5.0, 0.1, 0.4)).unwrap();
        let fusing = net.create_switch(Switch::bus_bus(0, 1)).unwrap();
        let mut coupling = Switch::bus_bus(0, 1);
        coupling.z_ohm = 0.5;
        net.create_switch(coupling).unwrap();
        net.drop_internal_branch_elements(&BTreeSet::from([0, 1]));
        assert_eq!(net.line.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(net.switch.keys().copied().collect::<Vec<_>>(), vec![fusing]);
    }

    #[test]
    fn shunt_at_bus_uses_rated_voltage() {
        let mut net = two_bus();
        let idx = net.create_shunt_at_bus(1, 0.5, -3.0, Some("cap")).unwrap();
        let shunt = &net.shunt[&idx];
        assert_eq!(shunt.vn_kv, 110.0);
        assert_eq!(shunt.step, 1);
        assert_eq!(shunt.name.as_deref(), Some("cap"));
    }
}
