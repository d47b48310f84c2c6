//! Markdown tables of power flow results.

use std::fmt;

use tabled::{settings::Style, Table, Tabled};

use super::{BranchResult, Network};

/// Table cell: a value and its number of decimals.
#[derive(Clone, Copy)]
struct Fixed(f64, usize);

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", self.1, self.0)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Tabled)]
struct BusRow {
    bus: i64,
    vm_pu: Fixed,
    va_degree: Fixed,
    p_mw: Fixed,
    q_mvar: Fixed,
}

/// One line, transformer or impedance.
#[derive(Debug, Tabled)]
struct BranchRow {
    index: i64,
    from: i64,
    to: i64,
    p_from_mw: Fixed,
    q_from_mvar: Fixed,
    p_to_mw: Fixed,
    q_to_mvar: Fixed,
    pl_mw: Fixed,
    ql_mvar: Fixed,
}

impl BranchRow {
    fn new(index: i64, from: i64, to: i64, r: &BranchResult) -> Self {
        let w = |v| Fixed(v, 4);
        Self {
            index,
            from,
            to,
            p_from_mw: w(r.p_from_mw),
            q_from_mvar: w(r.q_from_mvar),
            p_to_mw: w(r.p_to_mw),
            q_to_mvar: w(r.q_to_mvar),
            pl_mw: w(r.pl_mw),
            ql_mvar: w(r.ql_mvar),
        }
    }
}

impl Network {
    /// Renders the bus results as a table, `None` if the network has not been solved.
    pub fn bus_results_table(&self) -> Option<String> {
        let res = self.res.as_ref()?;
        let rows = res.bus.iter().map(|(&bus, r)| BusRow {
            bus,
            vm_pu: Fixed(r.vm_pu, 6),
            va_degree: Fixed(r.va_degree, 4),
            p_mw: Fixed(r.p_mw, 4),
            q_mvar: Fixed(r.q_mvar, 4),
        });
        Some(Table::new(rows).with(Style::markdown()).to_string())
    }

    /// Renders line, transformer and impedance results, one table after the other.
    pub fn branch_results_table(&self) -> Option<String> {
        let res = self.res.as_ref()?;
        let line = res.line.iter().filter_map(|(idx, r)| {
            let l = self.line.get(idx)?;
            Some(BranchRow::new(*idx, l.from_bus, l.to_bus, r))
        });
        let trafo = res.trafo.iter().filter_map(|(idx, r)| {
            let t = self.trafo.get(idx)?;
            Some(BranchRow::new(*idx, t.hv_bus, t.lv_bus, r))
        });
        let impedance = res.impedance.iter().filter_map(|(idx, r)| {
            let i = self.impedance.get(idx)?;
            Some(BranchRow::new(*idx, i.from_bus, i.to_bus, r))
        });
        let mut out = String::new();
        for (title, rows) in [
            ("line", line.collect::<Vec<_>>()),
            ("trafo", trafo.collect()),
            ("impedance", impedance.collect()),
        ] {
            if rows.is_empty() {
                continue;
            }
            out.push_str(title);
            out.push('\n');
            out.push_str(&Table::new(rows).with(Style::markdown()).to_string());
            out.push('\n');
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{NewtonPF, PowerFlowConfig, RunPF};
    use crate::testcases::five_bus;

    fn solved() -> Network {
        let mut net = five_bus();
        NewtonPF.run_pf(&mut net, &PowerFlowConfig::default()).unwrap();
        net
    }

    #[test]
    fn cells_use_their_decimals() {
        assert_eq!(Fixed(1.23456, 2).to_string(), "1.23");
        assert_eq!(format!("{:?}", Fixed(-0.5, 3)), "-0.500");
    }

    #[test]
    fn unsolved_network_has_no_tables() {
        let net = five_bus();
        assert!(net.bus_results_table().is_none());
        assert!(net.branch_results_table().is_none());
    }

    #[test]
    fn bus_table_has_one_row_per_bus() {
        let table = solved().bus_results_table().unwrap();
        let lines: Vec<&str> = table.lines().collect();
        // Header, separator and five buses.
        assert_eq!(lines.len(), 7);
        for column in ["bus", "vm_pu", "va_degree", "p_mw", "q_mvar"] {
            assert!(lines[0].contains(column), "{column} missing in {}", lines[0]);
        }
        assert!(lines[2].contains("1.020000"), "{}", lines[2]);
    }

    #[test]
    fn branch_tables_skip_empty_kinds() {
        let net = solved();
        let out = net.branch_results_table().unwrap();
        assert!(out.starts_with("line\n"));
        assert!(!out.contains("trafo") && !out.contains("impedance"));
        assert!(out.lines().nth(1).unwrap().contains("p_from_mw"));
        // Title, header, separator and one row per line.
        assert_eq!(out.lines().count(), 3 + net.line.len());
    }
}
