use cod_settlement_engine::{
    db_types::{CodReconciliation, VendorBalance, VendorEarning},
    traits::DailyReport,
};
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_balance(balance: &VendorBalance) -> String {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Vendor", "Pending", "Available", "Withheld", "Processing", "Paid", "Lifetime"]);
    table.add_row(row![
        balance.vendor_id,
        r->balance.pending,
        r->balance.available,
        r->balance.withheld,
        r->balance.processing,
        r->balance.paid,
        r->balance.lifetime_total()
    ]);
    table.to_string()
}

pub fn format_released(earnings: &[VendorEarning]) -> String {
    if earnings.is_empty() {
        return "No earnings were due for release".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["ID", "Vendor", "Order", "Gross", "Commission", "Net", "Held until"]);
    for e in earnings {
        table.add_row(row![
            e.id,
            e.vendor_id,
            e.order_id,
            r->e.amount,
            r->e.commission,
            r->e.net_amount,
            e.available_at.format("%Y-%m-%d %H:%M")
        ]);
    }
    format!("{} earnings released\n{table}", earnings.len())
}

pub fn format_reconciliations(recs: &[CodReconciliation]) -> String {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["ID", "Date", "Delivery person", "Orders", "Expected", "Collected", "Discrepancy", "Status"]);
    for rec in recs {
        table.add_row(row![
            rec.id,
            rec.date,
            rec.delivery_person_id,
            r->rec.total_orders_count,
            r->rec.total_cod_amount,
            r->rec.collected_amount,
            r->rec.discrepancy,
            rec.status
        ]);
    }
    table.to_string()
}

pub fn format_daily_report(report: &DailyReport) -> String {
    let mut result = format!("Reconciliation for {}: {} created", report.date, report.created.len());
    if !report.skipped.is_empty() {
        let skipped = report.skipped.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
        result.push_str(&format!(", already reconciled: {skipped}"));
    }
    if !report.created.is_empty() {
        result.push('\n');
        result.push_str(&format_reconciliations(&report.created));
    }
    result
}
