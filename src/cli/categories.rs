use comfy_table::{Cell, Table};

use crate::cli::Ledger;
use crate::error::Result;
use crate::models::Kind;

pub fn list(kind: Option<Kind>) -> Result<()> {
    let ledger = Ledger::open()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Kind", "Icon", "Color", "Used"]);
    for cat in ledger
        .categories
        .all()
        .iter()
        .filter(|c| kind.map_or(true, |k| c.kind == k))
    {
        let used = ledger
            .store
            .all()
            .iter()
            .filter(|t| t.category_id == cat.id)
            .count();
        table.add_row(vec![
            Cell::new(&cat.id),
            Cell::new(&cat.name),
            Cell::new(cat.kind),
            Cell::new(&cat.icon),
            Cell::new(&cat.color),
            Cell::new(used),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn add(name: &str, kind: Kind, icon: Option<&str>, color: Option<&str>) -> Result<()> {
    let mut ledger = Ledger::open()?;
    let cat = ledger.categories.add(&mut ledger.kv, name, kind, icon, color)?;
    println!("Added {} category: {} ({})", cat.kind, cat.name, cat.id);
    Ok(())
}

pub fn rename(id: &str, new_name: &str) -> Result<()> {
    let mut ledger = Ledger::open()?;
    ledger.categories.rename(&mut ledger.kv, id, new_name)?;
    println!("Renamed category {id} to: {}", new_name.trim());
    Ok(())
}

pub fn remove(id: &str) -> Result<()> {
    let mut ledger = Ledger::open()?;
    let removed = ledger.categories.remove(&mut ledger.kv, id)?;
    let orphans = ledger
        .store
        .all()
        .iter()
        .filter(|t| t.category_id == removed.id)
        .count();
    println!("Removed category: {}", removed.name);
    if orphans > 0 {
        println!("{orphans} transaction(s) still reference it and will show as (unknown)");
    }
    Ok(())
}
