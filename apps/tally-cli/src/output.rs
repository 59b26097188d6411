//! Plain-text rendering of reports and rows.

use std::fmt::Write;

use tally_core::{Money, Product, StockEntry, Store};
use tally_query::StockReport;

/// How money is printed.
#[derive(Debug, Clone)]
pub struct MoneyFormat {
    pub symbol: String,
    pub decimals: u8,
}

impl MoneyFormat {
    pub fn format(&self, amount: Money) -> String {
        amount.format_with(&self.symbol, self.decimals)
    }
}

impl Default for MoneyFormat {
    fn default() -> Self {
        MoneyFormat {
            symbol: "$".into(),
            decimals: 2,
        }
    }
}

const ROW_HEADER: [&str; 11] = [
    "Date", "Store", "Product", "Open", "Added", "Close", "Actual", "Sold", "Sales", "Profit",
    "Loss",
];

const GROUP_HEADER: [&str; 6] = ["Group", "Rows", "Sold", "Sales", "Profit", "Loss"];

/// Renders the page of rows, the filtered-set totals and any groups.
pub fn render_report(report: &StockReport, money: &MoneyFormat) -> String {
    let mut out = String::new();

    if report.rows.is_empty() {
        out.push_str("No stock rows match.\n");
    } else {
        let mut lines = vec![ROW_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        for row in &report.rows {
            let e = &row.entry;
            lines.push(vec![
                e.stock_date.to_string(),
                e.store_name.clone(),
                e.product_name.clone(),
                e.opening_stock.to_string(),
                e.stock_added.to_string(),
                e.closing_stock.to_string(),
                e.actual_stock.map_or_else(|| "-".to_string(), |a| a.to_string()),
                row.units_sold.to_string(),
                money.format(row.sales_amount),
                money.format(row.profit),
                money.format(row.product_loss),
            ]);
        }
        write_table(&mut out, &lines, 3);
    }

    let s = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Page {} of {} ({} rows)",
        report.page.page, report.page_count, report.filtered_count
    );
    let _ = writeln!(out, "Units sold:    {}", s.total_sold);
    let _ = writeln!(out, "Sales:         {}", money.format(s.total_sales));
    let _ = writeln!(out, "Profit:        {}", money.format(s.total_profit));
    let _ = writeln!(out, "Product loss:  {}", money.format(s.total_product_loss));

    if report.uncosted_shortages > 0 {
        let _ = writeln!(
            out,
            "Note: {} short row(s) have no cost price; their loss counts as zero.",
            report.uncosted_shortages
        );
    }

    if !report.groups.is_empty() {
        let mut lines = vec![GROUP_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        for group in &report.groups {
            lines.push(vec![
                group.name.clone(),
                group.rows.to_string(),
                group.summary.total_sold.to_string(),
                money.format(group.summary.total_sales),
                money.format(group.summary.total_profit),
                money.format(group.summary.total_product_loss),
            ]);
        }
        let _ = writeln!(out);
        write_table(&mut out, &lines, 1);
    }

    out
}

/// One-line description of a row after a movement.
pub fn render_entry(entry: &StockEntry) -> String {
    let actual = entry
        .actual_stock
        .map_or_else(|| "not counted".to_string(), |a| format!("counted {a}"));
    format!(
        "{} {} @ {}: open {}, added {}, close {}, {}",
        entry.stock_date,
        entry.product_name,
        entry.store_name,
        entry.opening_stock,
        entry.stock_added,
        entry.closing_stock,
        actual
    )
}

/// One-line description of a product after a price change.
pub fn render_product(product: &Product, money: &MoneyFormat) -> String {
    let cost = product
        .cost_price_cents
        .map_or_else(|| "uncosted".to_string(), |c| format!("cost {}", money.format(Money::from_cents(c))));
    format!(
        "{} {}: price {}, {}",
        product.sku,
        product.name,
        money.format(Money::from_cents(product.price_cents)),
        cost
    )
}

pub fn render_products(products: &[Product], money: &MoneyFormat) -> String {
    if products.is_empty() {
        return "No active products.\n".to_string();
    }
    let mut lines = vec![vec!["Id".to_string(), "SKU".into(), "Name".into(), "Price".into(), "Cost".into()]];
    for p in products {
        lines.push(vec![
            p.id.clone(),
            p.sku.clone(),
            p.name.clone(),
            money.format(Money::from_cents(p.price_cents)),
            p.cost_price_cents
                .map_or_else(|| "-".to_string(), |c| money.format(Money::from_cents(c))),
        ]);
    }
    let mut out = String::new();
    write_table(&mut out, &lines, 3);
    out
}

pub fn render_stores(stores: &[Store]) -> String {
    if stores.is_empty() {
        return "No active stores.\n".to_string();
    }
    let mut lines = vec![vec!["Id".to_string(), "Name".into()]];
    lines.extend(stores.iter().map(|s| vec![s.id.clone(), s.name.clone()]));
    let mut out = String::new();
    write_table(&mut out, &lines, 2);
    out
}

/// Pads every column to its widest cell. Columns from `first_numeric` on
/// are right-aligned.
fn write_table(out: &mut String, lines: &[Vec<String>], first_numeric: usize) {
    let columns = lines.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            lines
                .iter()
                .map(|l| l.get(col).map_or(0, |c| c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    for line in lines {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(col, (cell, &width))| {
                if col >= first_numeric {
                    format!("{cell:>width$}")
                } else {
                    format!("{cell:<width$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{PageRequest, ReconciledEntry, StockSummary};

    fn entry() -> StockEntry {
        let mut e = StockEntry::blank("p1", "s1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        e.opening_stock = 100;
        e.closing_stock = 85;
        e.actual_stock = Some(80);
        e.price_cents = 1000;
        e.cost_price_cents = Some(600);
        e.product_name = "Latte".into();
        e.store_name = "Harbour".into();
        e
    }

    #[test]
    fn test_render_entry() {
        let line = render_entry(&entry());
        assert_eq!(
            line,
            "2024-03-01 Latte @ Harbour: open 100, added 0, close 85, counted 80"
        );
    }

    #[test]
    fn test_render_product_and_lists() {
        let now = chrono::Utc::now();
        let latte = Product {
            id: "p1".into(),
            sku: "LATTE".into(),
            name: "Latte".into(),
            price_cents: 450,
            cost_price_cents: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let money = MoneyFormat::default();
        assert_eq!(render_product(&latte, &money), "LATTE Latte: price $4.50, uncosted");

        let table = render_products(std::slice::from_ref(&latte), &money);
        assert!(table.starts_with("Id"));
        // cost column is right-aligned under its header
        assert!(table.lines().nth(1).unwrap().ends_with("$4.50     -"));
        assert_eq!(render_products(&[], &money), "No active products.\n");

        let cafe = Store {
            id: "s1".into(),
            name: "Harbour".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(render_stores(&[cafe]).contains("s1  Harbour"));
    }

    #[test]
    fn test_money_format() {
        let euro = MoneyFormat {
            symbol: "€".into(),
            decimals: 2,
        };
        assert_eq!(euro.format(Money::from_cents(-50)), "-€0.50");
    }

    #[test]
    fn test_render_report_totals() {
        let e = entry();
        let row = ReconciledEntry::from(&e);
        let mut summary = StockSummary::default();
        summary.push(&e);

        let report = StockReport {
            rows: vec![row],
            filtered_count: 1,
            summary,
            uncosted_shortages: 0,
            groups: Vec::new(),
            page: PageRequest::default(),
            page_count: 1,
            error: None,
        };

        let text = render_report(&report, &MoneyFormat::default());
        assert!(text.contains("Latte"));
        assert!(text.contains("Page 1 of 1 (1 rows)"));
        assert!(text.contains("Profit:        $60.00"));
        assert!(text.contains("Product loss:  $30.00"));
        assert!(!text.contains("no cost price"));
    }

    #[test]
    fn test_render_empty_report() {
        let text = render_report(&StockReport::empty(PageRequest::default()), &MoneyFormat::default());
        assert!(text.starts_with("No stock rows match."));
        assert!(text.contains("Sales:         $0.00"));
    }
}
