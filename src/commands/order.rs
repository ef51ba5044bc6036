use anyhow::Result;
use colored::Colorize;
use reconcile::{ExecuteOrder, PhaseKind, precedences};

use crate::ui;

pub fn run() -> Result<()> {
    let execute = ExecuteOrder::standard()?;

    ui::header("Phase order");

    ui::section("Scan");
    for kind in PhaseKind::ALL {
        println!("  {:>2}. {:<18} {}", kind.index(), kind.label(), kind.title().dimmed());
    }

    ui::section("Execute");
    for (i, kind) in execute.sequence().iter().enumerate() {
        let after: Vec<&str> = kind.runs_after().iter().map(PhaseKind::label).collect();
        let constraint = if after.is_empty() {
            String::new()
        } else {
            format!("after {}", after.join(", "))
        };
        println!("  {:>2}. {:<18} {}", i + 1, kind.label(), constraint.dimmed());
    }

    println!();
    ui::dim(&format!("{} precedence constraints satisfied", precedences().count()));
    Ok(())
}
